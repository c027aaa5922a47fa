//! Objects and event context consumed by the provider.
//!
//! The event-processing framework owns events and their collections; the
//! provider only borrows an ordered slice of objects through [`Event`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SfError};

/// Kinematics the scale-factor lookup reads from an object.
pub trait PhysicsObject {
    /// Transverse momentum.
    fn pt(&self) -> f64;
    /// Pseudorapidity.
    fn eta(&self) -> f64;
}

/// Minimal reconstructed object (e.g. a muon) carrying pt and eta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Transverse momentum.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(pt: f64, eta: f64) -> Self {
        Self { pt, eta }
    }
}

impl PhysicsObject for Candidate {
    #[inline]
    fn pt(&self) -> f64 {
        self.pt
    }

    #[inline]
    fn eta(&self) -> f64 {
        self.eta
    }
}

impl<T: PhysicsObject + ?Sized> PhysicsObject for &T {
    #[inline]
    fn pt(&self) -> f64 {
        (**self).pt()
    }

    #[inline]
    fn eta(&self) -> f64 {
        (**self).eta()
    }
}

/// Name of an object collection inside an event, bound once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle(String);

impl CollectionHandle {
    /// Bind a handle to a collection name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Event context that resolves collection handles to object slices.
pub trait Event {
    /// Object type stored in the collections.
    type Object: PhysicsObject;

    /// Objects in the collection bound to `handle`, in event order.
    fn collection(&self, handle: &CollectionHandle) -> Result<&[Self::Object]>;
}

/// Simple owned event: named collections of [`Candidate`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Collections by name.
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<Candidate>>,
}

impl EventRecord {
    /// Create an event with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a collection.
    pub fn with_collection(mut self, name: impl Into<String>, objects: Vec<Candidate>) -> Self {
        self.collections.insert(name.into(), objects);
        self
    }
}

impl Event for EventRecord {
    type Object = Candidate;

    fn collection(&self, handle: &CollectionHandle) -> Result<&[Candidate]> {
        self.collections.get(handle.name()).map(Vec::as_slice).ok_or_else(|| {
            SfError::InvalidArgument(format!("collection '{}' not present in event", handle.name()))
        })
    }
}
