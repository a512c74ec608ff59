//! Listing table core for the MyList desktop client: the editable row table,
//! unsaved-change tracking, the legacy and modular command paths behind
//! [`OneRoomBridge`], and the HTTP/WebSocket plumbing to the listing server.

pub mod bridge;
pub mod channel;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod legacy;
pub mod ops;
pub mod pending;
pub mod row;
pub mod row_store;
pub mod state;

pub use bridge::{BridgeMode, OneRoomBridge};
pub use channel::{channel_url, ChannelConnection, ChannelMessage, ChannelSender};
pub use client::{ListingClient, ListingSource, LoadedListing, DEFAULT_REQUEST_TIMEOUT};
pub use commands::{CommandProcessor, ListingEvent, SequentialTemporaryIds, TemporaryIdSource};
pub use config::{PersistedConfig, WindowGeometry};
pub use error::ListingError;
pub use legacy::LegacyController;
pub use ops::ListingOps;
pub use pending::{PendingChange, PendingChangeTracker};
pub use row::{Row, TableSchema, MANAGER_FIELD};
pub use row_store::RowStore;
pub use state::ListingState;
