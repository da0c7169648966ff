//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

pub use missive_api_types::{JobStatus, JobType};

/// Writing direction of a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Arabic body text, Latin runs drawn with the fallback font.
    Rtl,
    /// Latin body text, Arabic runs drawn with the fallback font.
    Ltr,
}

impl TryFrom<&str> for Direction {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rtl" => Ok(Direction::Rtl),
            "ltr" => Ok(Direction::Ltr),
            _ => Err(()),
        }
    }
}
