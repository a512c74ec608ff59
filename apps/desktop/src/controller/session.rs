//! UI-thread owner of one listing view: the bridge, its current view id and
//! the inline status line.

use std::collections::BTreeMap;

use chrono::Local;
use crossbeam_channel::Sender;
use listing_core::{BridgeMode, OneRoomBridge, PersistedConfig};
use shared::domain::ListingKind;
use tracing::{debug, info, warn};

use crate::backend_bridge::commands::{BackendCommand, ViewId};
use crate::controller::events::{UiErrorContext, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

pub struct ListingSession {
    kind: ListingKind,
    manager: String,
    role: String,
    bridge: OneRoomBridge,
    config: PersistedConfig,
    view_id: Option<ViewId>,
    next_view_id: ViewId,
    pending_delete: Option<Vec<usize>>,
    status: String,
}

impl ListingSession {
    pub fn new(
        kind: ListingKind,
        manager: impl Into<String>,
        role: impl Into<String>,
        mode: BridgeMode,
        config: PersistedConfig,
    ) -> Self {
        Self {
            kind,
            manager: manager.into(),
            role: role.into(),
            bridge: OneRoomBridge::new(mode),
            config,
            view_id: None,
            next_view_id: 1,
            pending_delete: None,
            status: String::new(),
        }
    }

    pub fn kind(&self) -> ListingKind {
        self.kind
    }

    pub fn view_id(&self) -> Option<ViewId> {
        self.view_id
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn bridge(&self) -> &OneRoomBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut OneRoomBridge {
        &mut self.bridge
    }

    pub fn config(&self) -> &PersistedConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PersistedConfig {
        &mut self.config
    }

    /// Starts a fresh view. Any load still in flight for the previous view is
    /// cancelled, and its late completions are ignored.
    pub fn request_load(&mut self, cmd_tx: &Sender<BackendCommand>) -> bool {
        if self.manager.trim().is_empty() {
            self.status = "Set a manager before loading".to_string();
            return false;
        }
        if let Some(previous) = self.view_id.take() {
            dispatch_backend_command(
                cmd_tx,
                BackendCommand::CancelView { view_id: previous },
                &mut self.status,
            );
        }
        let view_id = self.next_view_id;
        self.next_view_id += 1;
        self.view_id = Some(view_id);
        self.pending_delete = None;

        let queued = dispatch_backend_command(
            cmd_tx,
            BackendCommand::LoadRows {
                view_id,
                kind: self.kind,
                manager: self.manager.clone(),
                role: self.role.clone(),
            },
            &mut self.status,
        );
        if queued {
            self.status = format!("Loading {} listing for {}...", self.kind.as_str(), self.manager);
        }
        queued
    }

    pub fn request_save(&mut self, cmd_tx: &Sender<BackendCommand>) -> bool {
        let Some(view_id) = self.view_id else {
            self.status = "Nothing loaded yet".to_string();
            return false;
        };
        let Some(request) = self.bridge.save_request(&self.manager) else {
            self.status = "Nothing loaded yet".to_string();
            return false;
        };
        if request.is_empty() {
            self.status = "Nothing to save".to_string();
            return false;
        }
        let summary = format!(
            "Saving {} added, {} updated, {} deleted...",
            request.added.len(),
            request.updated.len(),
            request.deleted.len()
        );
        let queued = dispatch_backend_command(
            cmd_tx,
            BackendCommand::SaveChanges {
                view_id,
                kind: self.kind,
                request,
            },
            &mut self.status,
        );
        if queued {
            self.status = summary;
        }
        queued
    }

    pub fn add_row(&mut self, initial: &BTreeMap<String, String>) -> Option<usize> {
        let position = self.bridge.add_row(initial);
        self.status = match position {
            Some(position) => format!("Added row {}", position + 1),
            None => "Add failed".to_string(),
        };
        position
    }

    pub fn update_cell(&mut self, position: usize, field: &str, value: &str) -> bool {
        let applied = self.bridge.update_cell(position, field, value);
        self.status = if applied {
            format!("Updated {field} on row {}", position + 1)
        } else {
            format!("Could not update {field} on row {}", position + 1)
        };
        applied
    }

    pub fn change_manager(&mut self, positions: &[usize], manager: &str) -> usize {
        let changed = self.bridge.change_manager(positions, manager);
        self.status = format!("Manager set to {manager} on {changed} row(s)");
        changed
    }

    /// Deletion waits for [`confirm_delete`](Self::confirm_delete).
    pub fn request_delete(&mut self, positions: Vec<usize>) {
        if positions.is_empty() {
            self.status = "No rows selected".to_string();
            return;
        }
        self.status = format!("Delete {} row(s)? (y/N)", positions.len());
        self.pending_delete = Some(positions);
    }

    pub fn awaiting_delete_confirmation(&self) -> bool {
        self.pending_delete.is_some()
    }

    pub fn confirm_delete(&mut self, confirmed: bool) -> usize {
        let Some(positions) = self.pending_delete.take() else {
            return 0;
        };
        if !confirmed {
            self.status = "Delete cancelled".to_string();
            return 0;
        }
        let removed = self.bridge.delete_rows(&positions);
        self.status = format!("Deleted {removed} row(s)");
        removed
    }

    /// Applies one backend event. Returns whether the table changed.
    pub fn handle_event(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::Info(text) => {
                self.status = text;
                false
            }
            UiEvent::RowsLoaded { view_id, listing } => {
                if !self.is_current(view_id) {
                    debug!(view_id, "session: ignoring rows for a stale view");
                    return false;
                }
                if self.bridge.state().map(|state| state.kind()) != Some(listing.kind) {
                    self.bridge.attach(listing.kind);
                }
                let count = self.bridge.load_rows(&listing.rows);
                let at = listing.fetched_at.with_timezone(&Local).format("%H:%M:%S");
                self.status = format!("Loaded {count} rows at {at}");
                info!(view_id, count, "session: rows loaded");
                true
            }
            UiEvent::SaveCompleted {
                view_id,
                sent,
                assignments,
            } => {
                if !self.is_current(view_id) {
                    debug!(view_id, "session: ignoring save completion for a stale view");
                    return false;
                }
                let promoted = self.bridge.acknowledge_save(&sent, &assignments);
                self.status = format!("Saved; {promoted} new row(s) received ids");
                true
            }
            UiEvent::ChannelMessage(message) => {
                self.status = format!("Channel: {}", serde_json::Value::Object(message));
                false
            }
            UiEvent::Error(err) => {
                let stale = match err.context() {
                    UiErrorContext::Load { view_id } | UiErrorContext::Save { view_id } => {
                        !self.is_current(view_id)
                    }
                    _ => false,
                };
                if stale {
                    debug!("session: ignoring error for a stale view: {}", err.message());
                    return false;
                }
                warn!("session: {}", err.status_line());
                self.status = err.status_line();
                false
            }
        }
    }

    /// Cancels the current view's in-flight work and drops the table.
    pub fn teardown(&mut self, cmd_tx: &Sender<BackendCommand>) {
        if let Some(view_id) = self.view_id.take() {
            dispatch_backend_command(
                cmd_tx,
                BackendCommand::CancelView { view_id },
                &mut self.status,
            );
        }
        self.bridge.detach();
        self.pending_delete = None;
    }

    fn is_current(&self, view_id: ViewId) -> bool {
        self.view_id == Some(view_id)
    }
}

#[cfg(test)]
#[path = "../tests/session_tests.rs"]
mod tests;
