//! Mobile network generation labels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network generation carried by a coverage region.
///
/// Ordered oldest to newest, so `max()` over a set gives the best service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkGeneration {
    #[serde(rename = "2G")]
    TwoG,
    #[serde(rename = "3G")]
    ThreeG,
    #[serde(rename = "4G")]
    FourG,
}

impl NetworkGeneration {
    pub fn all() -> &'static [NetworkGeneration] {
        &[
            NetworkGeneration::TwoG,
            NetworkGeneration::ThreeG,
            NetworkGeneration::FourG,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            NetworkGeneration::TwoG => "2G",
            NetworkGeneration::ThreeG => "3G",
            NetworkGeneration::FourG => "4G",
        }
    }
}

impl fmt::Display for NetworkGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGeneration(pub String);

impl fmt::Display for UnknownGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown network generation `{}`", self.0)
    }
}

impl std::error::Error for UnknownGeneration {}

impl FromStr for NetworkGeneration {
    type Err = UnknownGeneration;

    /// Accepts the generation labels and the radio technologies operators
    /// report in site exports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "2G" | "2" | "GSM" | "GPRS" | "EDGE" => Ok(NetworkGeneration::TwoG),
            "3G" | "3" | "UMTS" | "WCDMA" | "HSPA" | "HSPA+" => Ok(NetworkGeneration::ThreeG),
            "4G" | "4" | "LTE" => Ok(NetworkGeneration::FourG),
            _ => Err(UnknownGeneration(s.to_string())),
        }
    }
}
