//! Which object observables feed the table's X and Y axes.

use crate::error::{Result, SfError};
use crate::object::PhysicsObject;

/// Table name fragment declaring `|eta|` on X and pt on Y.
pub const ABSETA_PT_TAG: &str = "abseta_pt_ratio";
/// Table name fragment declaring pt on X and `|eta|` on Y.
pub const PT_ABSETA_TAG: &str = "pt_abseta_ratio";

/// Axis orientation of a correction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMapping {
    /// X = `|eta|`, Y = pt.
    AbsEtaVsPt,
    /// X = pt, Y = `|eta|`.
    PtVsAbsEta,
}

impl AxisMapping {
    /// Derive the orientation from a table name.
    ///
    /// `abseta_pt_ratio` is checked first, so a name containing both
    /// fragments resolves to [`AxisMapping::AbsEtaVsPt`].
    pub fn from_table_name(name: &str) -> Result<Self> {
        if name.contains(ABSETA_PT_TAG) {
            Ok(AxisMapping::AbsEtaVsPt)
        } else if name.contains(PT_ABSETA_TAG) {
            Ok(AxisMapping::PtVsAbsEta)
        } else {
            Err(SfError::Configuration(format!(
                "cannot infer axis orientation from table name {name:?} \
                 (expected it to contain '{ABSETA_PT_TAG}' or '{PT_ABSETA_TAG}')"
            )))
        }
    }

    /// `(x, y)` lookup coordinates for an object.
    #[inline]
    pub fn coordinates<O: PhysicsObject + ?Sized>(self, obj: &O) -> (f64, f64) {
        match self {
            AxisMapping::AbsEtaVsPt => (obj.eta().abs(), obj.pt()),
            AxisMapping::PtVsAbsEta => (obj.pt(), obj.eta().abs()),
        }
    }
}
