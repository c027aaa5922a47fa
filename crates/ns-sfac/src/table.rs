//! Lookup-table abstraction consumed by the scale-factor provider.
//!
//! The provider only needs axis binning plus per-bin value and uncertainty,
//! so storage formats stay behind this trait.

use crate::histogram::Axis;

/// Read-only 2-D correction table.
///
/// Bin indices use the histogram convention (`1..=n_bins` in range).
/// Implementations must not change binning or contents after construction.
pub trait CorrectionTable: Send + Sync {
    /// Table name, which also declares its axis orientation.
    fn name(&self) -> &str;

    /// X axis binning.
    fn x_axis(&self) -> &Axis;

    /// Y axis binning.
    fn y_axis(&self) -> &Axis;

    /// Central value of a bin.
    fn content(&self, bin_x: usize, bin_y: usize) -> f64;

    /// One-sigma statistical uncertainty of a bin.
    fn error(&self, bin_x: usize, bin_y: usize) -> f64;
}
