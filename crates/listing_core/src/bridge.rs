//! Front door for table edits while the listing tab migrates from the legacy
//! controller to the modular command stack.
//!
//! The bridge owns the [`ListingState`] and hands it to exactly one
//! implementation per call. In [`BridgeMode::Modular`] a failed call is
//! retried once on the legacy path; the mode itself only changes through
//! [`OneRoomBridge::set_mode`]. Public operations never return errors: they
//! report `false`/`0`/`None` and log the cause.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{Identity, ListingKind},
    protocol::SaveRequest,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    commands::{CommandProcessor, ListingEvent},
    error::{ListingError, Result},
    legacy::LegacyController,
    ops::ListingOps,
    pending::PendingChange,
    row::{Row, ID_FIELD},
    state::ListingState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    Legacy,
    #[default]
    Modular,
}

impl std::str::FromStr for BridgeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "modular" => Ok(Self::Modular),
            other => Err(format!("unknown bridge mode: {other}")),
        }
    }
}

pub struct OneRoomBridge {
    mode: BridgeMode,
    state: Option<ListingState>,
    legacy: Box<dyn ListingOps>,
    modular: Box<dyn ListingOps>,
    events: broadcast::Sender<ListingEvent>,
    fallbacks: u64,
}

impl OneRoomBridge {
    pub fn new(mode: BridgeMode) -> Self {
        let events = CommandProcessor::event_channel();
        let modular = CommandProcessor::new(events.clone());
        Self {
            mode,
            state: None,
            legacy: Box::new(LegacyController::new()),
            modular: Box::new(modular),
            events,
            fallbacks: 0,
        }
    }

    pub fn with_paths(
        mode: BridgeMode,
        legacy: Box<dyn ListingOps>,
        modular: Box<dyn ListingOps>,
    ) -> Self {
        Self {
            mode,
            state: None,
            legacy,
            modular,
            events: CommandProcessor::event_channel(),
            fallbacks: 0,
        }
    }

    pub fn mode(&self) -> BridgeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: BridgeMode) {
        if self.mode != mode {
            info!(from = ?self.mode, to = ?mode, "bridge: switching implementation");
        }
        self.mode = mode;
    }

    /// How many modular calls were answered by the legacy path.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListingEvent> {
        self.events.subscribe()
    }

    /// Installs an empty table for `kind`, discarding any previous one.
    pub fn attach(&mut self, kind: ListingKind) {
        self.state = Some(ListingState::new(kind));
    }

    pub fn detach(&mut self) -> Option<ListingState> {
        self.state.take()
    }

    pub fn is_attached(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ListingState> {
        self.state.as_ref()
    }

    pub fn rows(&self) -> &[Row] {
        self.state
            .as_ref()
            .map(|state| state.store.rows())
            .unwrap_or_default()
    }

    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.state
            .as_ref()
            .map(|state| state.tracker.changes())
            .unwrap_or_default()
    }

    pub fn add_row(&mut self, initial: &BTreeMap<String, String>) -> Option<usize> {
        let result = self.dispatch("add_row", |ops, state| ops.add_row(state, initial));
        report("add_row", result)
    }

    pub fn delete_rows(&mut self, positions: &[usize]) -> usize {
        let result = self.dispatch("delete_rows", |ops, state| ops.delete_rows(state, positions));
        report("delete_rows", result).unwrap_or(0)
    }

    pub fn update_cell(&mut self, position: usize, field: &str, value: &str) -> bool {
        let result = self.dispatch("update_cell", |ops, state| {
            ops.update_cell(state, position, field, value)
        });
        report("update_cell", result).is_some()
    }

    pub fn change_manager(&mut self, positions: &[usize], manager: &str) -> usize {
        let result = self.dispatch("change_manager", |ops, state| {
            ops.change_manager(state, positions, manager)
        });
        report("change_manager", result).unwrap_or(0)
    }

    /// Applies a server-assigned id to the row created under `old_id`. Both
    /// arguments are wire ids: `old_id` negative, `new_id` positive.
    pub fn update_row_identity(&mut self, old_id: i64, new_id: i64) -> bool {
        let (Ok(Identity::Temporary(temp_id)), Ok(Identity::Persisted(real_id))) =
            (Identity::from_wire(old_id), Identity::from_wire(new_id))
        else {
            warn!(old_id, new_id, "bridge: identity update needs a temporary and a persisted id");
            return false;
        };
        let Some(state) = self.state.as_ref() else {
            error!(old_id, new_id, "bridge: update_row_identity: {}", ListingError::missing_model());
            return false;
        };
        if state
            .store
            .find_position(Identity::Temporary(temp_id))
            .is_none()
        {
            warn!(old_id, new_id, "bridge: no row carries the temporary id");
            return false;
        }

        let result = self.dispatch("update_row_identity", |ops, state| {
            ops.promote_identity(state, temp_id, real_id)
        });
        report("update_row_identity", result).is_some()
    }

    /// Replaces the table after a successful load.
    pub fn load_rows(&mut self, rows: &[Row]) -> usize {
        let result = self.dispatch("load_rows", |ops, state| ops.load_rows(state, rows));
        report("load_rows", result).unwrap_or(0)
    }

    pub fn save_request(&self, manager: &str) -> Option<SaveRequest> {
        let Some(state) = self.state.as_ref() else {
            error!("bridge: save_request: {}", ListingError::missing_model());
            return None;
        };
        Some(state.tracker.to_save_request(&state.store, manager))
    }

    /// Applies the id assignments of a confirmed save, then forgets what was
    /// sent. A new row deleted while its save was in flight is deleted again
    /// under the id the server gave it. Returns how many identities were
    /// promoted.
    pub fn acknowledge_save(&mut self, sent: &SaveRequest, assignments: &[(i64, i64)]) -> usize {
        let mut promoted = 0;
        for &(old_id, new_id) in assignments {
            match self.deleted_while_saving(sent, old_id, new_id) {
                Some(created) => {
                    if let Some(state) = self.state.as_mut() {
                        info!(old_id, new_id, "bridge: row deleted during save; deleting it on the server");
                        state.tracker.record_delete(created);
                    }
                }
                None => {
                    if self.update_row_identity(old_id, new_id) {
                        promoted += 1;
                    }
                }
            }
        }
        match self.state.as_mut() {
            Some(state) => state.tracker.acknowledge(sent, &state.store),
            None => error!("bridge: acknowledge_save: {}", ListingError::missing_model()),
        }
        promoted
    }

    /// The persisted identity the server created for `old_id` when that row
    /// was sent as an addition but is no longer in the table.
    fn deleted_while_saving(&self, sent: &SaveRequest, old_id: i64, new_id: i64) -> Option<Identity> {
        let state = self.state.as_ref()?;
        let (Ok(temp @ Identity::Temporary(temp_id)), Ok(created @ Identity::Persisted(_))) =
            (Identity::from_wire(old_id), Identity::from_wire(new_id))
        else {
            return None;
        };
        let was_sent = sent
            .added
            .iter()
            .any(|row| row.get(ID_FIELD).and_then(Value::as_i64) == Some(old_id));
        let gone = state.store.find_position(temp).is_none() && !state.tracker.was_promoted(temp_id);
        (was_sent && gone).then_some(created)
    }

    fn dispatch<T>(
        &mut self,
        operation: &'static str,
        mut call: impl FnMut(&mut dyn ListingOps, &mut ListingState) -> Result<T>,
    ) -> Result<T> {
        let Some(state) = self.state.as_mut() else {
            return Err(ListingError::missing_model());
        };
        match self.mode {
            BridgeMode::Legacy => call(self.legacy.as_mut(), state),
            BridgeMode::Modular => match call(self.modular.as_mut(), state) {
                Ok(value) => Ok(value),
                Err(err) => {
                    error!(
                        operation,
                        path = self.modular.name(),
                        "bridge: modular call failed, retrying on legacy path: {err}"
                    );
                    self.fallbacks += 1;
                    call(self.legacy.as_mut(), state)
                }
            },
        }
    }
}

fn report<T>(operation: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err @ ListingError::Configuration(_)) => {
            error!(operation, "bridge: {err}");
            None
        }
        Err(err) => {
            warn!(operation, "bridge: {err}");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
