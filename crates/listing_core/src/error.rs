use shared::{domain::Identity, error::IdentityError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("row position {position} out of bounds (rows: {len})")]
    PositionNotFound { position: usize, len: usize },
    #[error("row {0} not found")]
    IdentityNotFound(Identity),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl ListingError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PositionNotFound { .. } | Self::IdentityNotFound(_)
        )
    }

    pub fn missing_model() -> Self {
        Self::Configuration("listing model is not attached".to_string())
    }
}

impl From<IdentityError> for ListingError {
    fn from(value: IdentityError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<reqwest::Error> for ListingError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else if value.is_timeout() {
            Self::Transport(format!("request timed out: {value}"))
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ListingError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

pub type Result<T, E = ListingError> = std::result::Result<T, E>;
