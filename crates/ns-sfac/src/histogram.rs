//! 2-D histogram type returned by `TableFile::get_table`.
//!
//! Bin numbering follows the usual histogram convention: bin `0` is the
//! underflow, bins `1..=n_bins` are in range, bin `n_bins + 1` is the overflow.
//! Only in-range contents are stored.

use crate::error::{Result, SfError};
use crate::table::CorrectionTable;

/// Ordered bin edges along one histogram axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    edges: Vec<f64>,
}

impl Axis {
    /// Largest bin count accepted for a uniform axis.
    pub const MAX_UNIFORM_BINS: usize = 1 << 20;

    /// Variable-width axis from explicit edges (length = n_bins + 1).
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(SfError::Deserialization(format!(
                "axis needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
            return Err(SfError::Deserialization(format!("non-finite axis edge: {}", bad)));
        }
        if let Some(w) = edges.windows(2).find(|w| w[1] <= w[0]) {
            return Err(SfError::Deserialization(format!(
                "axis edges must be strictly increasing: {} then {}",
                w[0], w[1]
            )));
        }
        Ok(Self { edges })
    }

    /// Uniform axis with `n_bins` equal-width bins on `[min, max)`.
    ///
    /// `n_bins` is limited to [`Axis::MAX_UNIFORM_BINS`].
    pub fn uniform(n_bins: usize, min: f64, max: f64) -> Result<Self> {
        if n_bins == 0 || n_bins > Self::MAX_UNIFORM_BINS {
            return Err(SfError::Deserialization(format!(
                "uniform axis bin count {} outside 1..={}",
                n_bins,
                Self::MAX_UNIFORM_BINS
            )));
        }
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(SfError::Deserialization(format!(
                "uniform axis needs finite min < max, got [{}, {}]",
                min, max
            )));
        }
        let width = (max - min) / n_bins as f64;
        let edges = (0..=n_bins).map(|i| min + i as f64 * width).collect();
        Self::new(edges)
    }

    /// Number of in-range bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lower edge of the first bin.
    pub fn x_min(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the last bin.
    pub fn x_max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin containing `v`.
    ///
    /// Bins are half-open `[lo, hi)`. Values below the first edge map to `0`;
    /// values at or above the last edge, and NaN, map to `n_bins + 1`.
    pub fn find_bin(&self, v: f64) -> usize {
        if v < self.x_min() {
            0
        } else if v >= self.x_max() || v.is_nan() {
            self.n_bins() + 1
        } else {
            self.edges.partition_point(|&e| e <= v)
        }
    }
}

/// A 2-D histogram holding per-bin values and their uncertainties.
#[derive(Debug, Clone)]
pub struct Histogram2D {
    /// Histogram name.
    pub name: String,
    /// Histogram title.
    pub title: String,
    x_axis: Axis,
    y_axis: Axis,
    /// In-range contents, x fastest (length = nx * ny).
    bin_content: Vec<f64>,
    /// Sum of weights squared per in-range bin, if stored.
    sumw2: Option<Vec<f64>>,
}

impl Histogram2D {
    /// Build a histogram from axes and in-range contents (x fastest).
    pub fn new(
        name: impl Into<String>,
        x_axis: Axis,
        y_axis: Axis,
        bin_content: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        let expected = x_axis.n_bins() * y_axis.n_bins();
        if bin_content.len() != expected {
            return Err(SfError::Deserialization(format!(
                "{}: bin content length {} != nx*ny {}",
                name,
                bin_content.len(),
                expected
            )));
        }
        Ok(Self { name, title: String::new(), x_axis, y_axis, bin_content, sumw2: None })
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Attach per-bin errors (stored as their squares).
    pub fn with_errors(self, errors: Vec<f64>) -> Result<Self> {
        if let Some(bad) = errors.iter().find(|e| !e.is_finite() || **e < 0.0) {
            return Err(SfError::Deserialization(format!(
                "{}: bin errors must be finite and >= 0, got {}",
                self.name, bad
            )));
        }
        let sumw2 = errors.iter().map(|e| e * e).collect();
        self.with_sumw2(sumw2)
    }

    /// Attach per-bin sum of weights squared.
    pub fn with_sumw2(mut self, sumw2: Vec<f64>) -> Result<Self> {
        if sumw2.len() != self.bin_content.len() {
            return Err(SfError::Deserialization(format!(
                "{}: sumw2 length {} != bin content length {}",
                self.name,
                sumw2.len(),
                self.bin_content.len()
            )));
        }
        self.sumw2 = Some(sumw2);
        Ok(self)
    }

    /// X axis.
    pub fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    /// Y axis.
    pub fn y_axis(&self) -> &Axis {
        &self.y_axis
    }

    /// Whether per-bin sumw2 is stored.
    pub fn has_sumw2(&self) -> bool {
        self.sumw2.is_some()
    }

    /// Locate the `(bin_x, bin_y)` pair for a point, flow bins included.
    pub fn find_bin(&self, x: f64, y: f64) -> (usize, usize) {
        (self.x_axis.find_bin(x), self.y_axis.find_bin(y))
    }

    fn index(&self, bin_x: usize, bin_y: usize) -> Option<usize> {
        let nx = self.x_axis.n_bins();
        let ny = self.y_axis.n_bins();
        if (1..=nx).contains(&bin_x) && (1..=ny).contains(&bin_y) {
            Some((bin_y - 1) * nx + (bin_x - 1))
        } else {
            None
        }
    }

    /// Content of an in-range bin; flow bins are not stored and read as `0.0`.
    pub fn bin_content(&self, bin_x: usize, bin_y: usize) -> f64 {
        self.index(bin_x, bin_y).map_or(0.0, |i| self.bin_content[i])
    }

    /// Error of an in-range bin.
    ///
    /// `sqrt(sumw2)` when stored, otherwise `sqrt(max(content, 0))`.
    pub fn bin_error(&self, bin_x: usize, bin_y: usize) -> f64 {
        let Some(i) = self.index(bin_x, bin_y) else {
            return 0.0;
        };
        match &self.sumw2 {
            Some(sw2) => sw2[i].sqrt(),
            None => self.bin_content[i].max(0.0).sqrt(),
        }
    }
}

impl CorrectionTable for Histogram2D {
    fn name(&self) -> &str {
        &self.name
    }

    fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    fn y_axis(&self) -> &Axis {
        &self.y_axis
    }

    fn content(&self, bin_x: usize, bin_y: usize) -> f64 {
        self.bin_content(bin_x, bin_y)
    }

    fn error(&self, bin_x: usize, bin_y: usize) -> f64 {
        self.bin_error(bin_x, bin_y)
    }
}
