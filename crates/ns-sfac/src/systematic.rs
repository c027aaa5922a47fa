//! Systematic variation selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SfError;

/// Which variation of the scale factor to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Systematic {
    /// Nominal bin value.
    #[serde(rename = "CT")]
    Central,
    /// Bin value shifted up by the combined uncertainty.
    #[serde(rename = "UP")]
    Up,
    /// Bin value shifted down by the combined uncertainty.
    #[serde(rename = "DN")]
    Down,
}

impl Systematic {
    /// All variations, nominal first.
    pub const ALL: [Systematic; 3] = [Systematic::Central, Systematic::Up, Systematic::Down];

    /// Short key (`CT`, `UP`, `DN`).
    pub fn as_str(self) -> &'static str {
        match self {
            Systematic::Central => "CT",
            Systematic::Up => "UP",
            Systematic::Down => "DN",
        }
    }

    /// Direction of the shift: `0` for central, `+1` up, `-1` down.
    pub fn sign(self) -> f64 {
        match self {
            Systematic::Central => 0.0,
            Systematic::Up => 1.0,
            Systematic::Down => -1.0,
        }
    }
}

impl fmt::Display for Systematic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Systematic {
    type Err = SfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CT" => Ok(Systematic::Central),
            "UP" => Ok(Systematic::Up),
            "DN" => Ok(Systematic::Down),
            other => Err(SfError::InvalidArgument(format!(
                "undefined key for systematic variation: {other:?} (expected CT, UP or DN)"
            ))),
        }
    }
}
