//! Backend-to-UI events and error modeling for the listing controller.

use listing_core::{ChannelMessage, ListingError, LoadedListing};
use shared::protocol::SaveRequest;

use crate::backend_bridge::commands::ViewId;

#[derive(Debug)]
pub enum UiEvent {
    Info(String),
    RowsLoaded {
        view_id: ViewId,
        listing: LoadedListing,
    },
    SaveCompleted {
        view_id: ViewId,
        sent: SaveRequest,
        assignments: Vec<(i64, i64)>,
    },
    ChannelMessage(ChannelMessage),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Configuration,
    NotFound,
    Transport,
    Decode,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Load { view_id: ViewId },
    Save { view_id: ViewId },
    Channel,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_listing(context: UiErrorContext, err: &ListingError) -> Self {
        let category = match err {
            ListingError::Configuration(_) => UiErrorCategory::Configuration,
            ListingError::PositionNotFound { .. } | ListingError::IdentityNotFound(_) => {
                UiErrorCategory::NotFound
            }
            ListingError::Transport(_) => UiErrorCategory::Transport,
            ListingError::Decode(_) => UiErrorCategory::Decode,
            ListingError::Validation(_) => UiErrorCategory::Validation,
        };
        Self {
            category,
            context,
            message: err.to_string(),
        }
    }

    /// For failures that only exist as text, e.g. from `anyhow` chains.
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("timed out")
            || lower.contains("connect")
            || lower.contains("connection")
            || lower.contains("websocket")
            || lower.contains("network")
        {
            UiErrorCategory::Transport
        } else if lower.contains("malformed") || lower.contains("decode") {
            UiErrorCategory::Decode
        } else if lower.contains("invalid") || lower.contains("missing") {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };
        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// One-line text for the inline status area.
    pub fn status_line(&self) -> String {
        let action = match self.context {
            UiErrorContext::BackendStartup => "Backend startup failed",
            UiErrorContext::Load { .. } => "Load failed",
            UiErrorContext::Save { .. } => "Save failed",
            UiErrorContext::Channel => "Channel error",
            UiErrorContext::General => "Error",
        };
        format!("{action}: {}", self.message)
    }
}

#[cfg(test)]
#[path = "../tests/events_tests.rs"]
mod tests;
