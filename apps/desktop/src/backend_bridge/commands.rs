//! Backend commands queued from the UI loop to the backend worker.

use listing_core::ChannelMessage;
use shared::{domain::ListingKind, protocol::SaveRequest};

/// Identifies one listing view (tab). Completions for a torn-down view are
/// cancelled or ignored.
pub type ViewId = u64;

#[derive(Debug)]
pub enum BackendCommand {
    LoadRows {
        view_id: ViewId,
        kind: ListingKind,
        manager: String,
        role: String,
    },
    SaveChanges {
        view_id: ViewId,
        kind: ListingKind,
        request: SaveRequest,
    },
    CancelView {
        view_id: ViewId,
    },
    OpenChannel {
        url: String,
    },
    SendChannel {
        message: ChannelMessage,
    },
    Shutdown,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadRows { .. } => "load_rows",
            Self::SaveChanges { .. } => "save_changes",
            Self::CancelView { .. } => "cancel_view",
            Self::OpenChannel { .. } => "open_channel",
            Self::SendChannel { .. } => "send_channel",
            Self::Shutdown => "shutdown",
        }
    }
}
