//! # ns-sfac
//!
//! Object scale-factor weights for NextStat.
//!
//! Looks up per-object correction factors (e.g. muon identification
//! efficiencies) in a 2-D table binned in `|eta|` and pt, combines the bin
//! uncertainty with a flat fractional systematic, and multiplies the factors of
//! all objects in an event into a single weight for the central, up and down
//! variations.
//!
//! ## Example
//!
//! ```no_run
//! use ns_sfac::{Candidate, EventRecord, ScaleFactorProvider, Systematic};
//!
//! let sf = ScaleFactorProvider::open(
//!     "muons",
//!     "muon_id_sf.json",
//!     "NUM_TightID_DEN_genTracks_abseta_pt_ratio",
//!     0.01,
//! )
//! .unwrap();
//!
//! let evt = EventRecord::new().with_collection("muons", vec![Candidate::new(42.0, -1.3)]);
//! let w_up = sf.weight(&evt, Systematic::Up).unwrap();
//! println!("weight (UP): {w_up}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod datasource;
pub mod error;
pub mod file;
pub mod histogram;
pub mod key;
pub mod mapping;
pub mod object;
pub mod provider;
pub mod systematic;
pub mod table;

pub use config::ScaleFactorConfig;
pub use error::{Result, SfError};
pub use file::TableFile;
pub use histogram::{Axis, Histogram2D};
pub use key::KeyInfo;
pub use mapping::AxisMapping;
pub use object::{Candidate, CollectionHandle, Event, EventRecord, PhysicsObject};
pub use provider::{
    BinLookup, OUT_OF_RANGE_PENALTY, ScaleFactorProvider, SystematicWeights, combined_sigma,
};
pub use systematic::Systematic;
pub use table::CorrectionTable;
