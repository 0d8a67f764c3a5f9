//! Output resolution definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Fixed set of output resolutions a clip can be exported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportSize {
    /// 630x354 (small preview)
    #[serde(rename = "630x354")]
    Small,
    /// 850x480 (SD)
    #[serde(rename = "850x480")]
    Medium,
    /// 1920x1080 (Full HD)
    #[serde(rename = "1920x1080")]
    FullHd,
}

impl ExportSize {
    pub const ALL: &'static [ExportSize] = &[ExportSize::Small, ExportSize::Medium, ExportSize::FullHd];

    pub fn width(&self) -> u32 {
        match self {
            ExportSize::Small => 630,
            ExportSize::Medium => 850,
            ExportSize::FullHd => 1920,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            ExportSize::Small => 354,
            ExportSize::Medium => 480,
            ExportSize::FullHd => 1080,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportSize::Small => "630x354",
            ExportSize::Medium => "850x480",
            ExportSize::FullHd => "1920x1080",
        }
    }
}

impl Default for ExportSize {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for ExportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportSize {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportSize::ALL
            .iter()
            .copied()
            .find(|size| size.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::InvalidSize(s.to_string()))
    }
}
