//! Closed region classification for addresses.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Coarse geographic region of an address.
///
/// Stored and compared in canonical uppercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    North,
    South,
    East,
    West,
}

impl Region {
    pub const ALL: [Region; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Canonical storage text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "NORTH",
            Self::South => "SOUTH",
            Self::East => "EAST",
            Self::West => "WEST",
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region text that matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRegion(pub String);

impl Display for UnknownRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown region `{}`", self.0)
    }
}

impl Error for UnknownRegion {}

impl FromStr for Region {
    type Err = UnknownRegion;

    /// Parses region text case-insensitively; surrounding whitespace is
    /// not trimmed.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let canonical = value.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|region| region.as_str() == canonical)
            .ok_or_else(|| UnknownRegion(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Region, UnknownRegion};

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("west".parse::<Region>().unwrap(), Region::West);
        assert_eq!("NoRtH".parse::<Region>().unwrap(), Region::North);
        assert_eq!("SOUTH".parse::<Region>().unwrap(), Region::South);
    }

    #[test]
    fn parse_rejects_unknown_text() {
        let err = "northwest".parse::<Region>().unwrap_err();
        assert_eq!(err, UnknownRegion("northwest".to_string()));
        assert!(" east".parse::<Region>().is_err());
    }

    #[test]
    fn display_uses_canonical_uppercase() {
        for region in Region::ALL {
            assert_eq!(region.to_string(), region.as_str());
            assert_eq!(region.as_str(), region.as_str().to_ascii_uppercase());
        }
    }
}
