use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Row identity. On the wire persisted rows carry positive ids and rows that
/// were created locally and never saved carry negative ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Identity {
    Temporary(u64),
    Persisted(u64),
}

impl Identity {
    /// Largest magnitude either variant can carry on the wire.
    pub const MAX_MAGNITUDE: u64 = i64::MAX as u64;

    pub fn from_wire(value: i64) -> Result<Self, IdentityError> {
        match value {
            0 => Err(IdentityError::Zero),
            i64::MIN => Err(IdentityError::OutOfRange(value)),
            v if v > 0 => Ok(Self::Persisted(v.unsigned_abs())),
            v => Ok(Self::Temporary(v.unsigned_abs())),
        }
    }

    /// Magnitudes above [`Self::MAX_MAGNITUDE`] saturate; `from_wire` never
    /// produces them.
    pub fn to_wire(self) -> i64 {
        match self {
            Self::Persisted(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Self::Temporary(n) => -i64::try_from(n).unwrap_or(i64::MAX),
        }
    }

    pub fn is_temporary(self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    pub fn is_persisted(self) -> bool {
        matches!(self, Self::Persisted(_))
    }
}

impl TryFrom<i64> for Identity {
    type Error = IdentityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_wire(value)
    }
}

impl From<Identity> for i64 {
    fn from(value: Identity) -> Self {
        value.to_wire()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(n) => write!(f, "#{n}"),
            Self::Temporary(n) => write!(f, "tmp-{n}"),
        }
    }
}

/// Listing tables served by the mylist endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Oneroom,
    Shop,
}

impl ListingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oneroom => "oneroom",
            Self::Shop => "shop",
        }
    }

    pub fn load_path(self) -> String {
        format!("/mylist/get_mylist_{}_data", self.as_str())
    }

    pub fn save_path(self) -> String {
        format!("/mylist/save_mylist_{}_data", self.as_str())
    }
}

impl std::str::FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oneroom" | "one_room" => Ok(Self::Oneroom),
            "shop" | "shops" => Ok(Self::Shop),
            other => Err(format!("unknown listing kind: {other}")),
        }
    }
}
