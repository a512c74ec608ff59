//! Modular command stack: each user action becomes one atomic command over the
//! listing state, and every applied command is announced as a [`ListingEvent`].

use std::collections::{BTreeMap, BTreeSet};

use shared::domain::Identity;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::{ListingError, Result},
    ops::ListingOps,
    row::{Row, ID_FIELD, MANAGER_FIELD},
    state::ListingState,
};

/// First temporary id handed out when no [`TemporaryIdSource`] is installed.
pub const FALLBACK_TEMP_ID_BASE: u64 = 1 << 40;
const EVENT_CAPACITY: usize = 256;

/// Supplies temporary row ids. Successive ids must be strictly increasing so
/// the negative wire ids keep strictly decreasing.
pub trait TemporaryIdSource: Send {
    /// `None` once the source is exhausted.
    fn next_temporary(&mut self) -> Option<u64>;
}

#[derive(Debug, Clone)]
pub struct SequentialTemporaryIds {
    next: u64,
}

impl SequentialTemporaryIds {
    pub fn starting_at(next: u64) -> Self {
        Self { next: next.max(1) }
    }
}

impl Default for SequentialTemporaryIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TemporaryIdSource for SequentialTemporaryIds {
    fn next_temporary(&mut self) -> Option<u64> {
        let id = self.next;
        self.next = self.next.checked_add(1)?;
        Some(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEvent {
    RowInserted {
        position: usize,
        identity: Identity,
    },
    RowsRemoved {
        /// Descending, in removal order.
        positions: Vec<usize>,
    },
    CellChanged {
        position: usize,
        field: String,
        value: String,
    },
    IdentityPromoted {
        position: usize,
        from: Identity,
        to: Identity,
    },
    Reset {
        rows: usize,
    },
}

pub struct CommandProcessor {
    temp_ids: Option<Box<dyn TemporaryIdSource>>,
    fallback_next: u64,
    events: broadcast::Sender<ListingEvent>,
}

impl CommandProcessor {
    pub fn new(events: broadcast::Sender<ListingEvent>) -> Self {
        Self {
            temp_ids: Some(Box::new(SequentialTemporaryIds::default())),
            fallback_next: FALLBACK_TEMP_ID_BASE,
            events,
        }
    }

    /// Without an id source every temporary id comes from the fallback counter.
    pub fn without_id_source(events: broadcast::Sender<ListingEvent>) -> Self {
        Self {
            temp_ids: None,
            fallback_next: FALLBACK_TEMP_ID_BASE,
            events,
        }
    }

    pub fn with_id_source(mut self, source: Box<dyn TemporaryIdSource>) -> Self {
        self.temp_ids = Some(source);
        self
    }

    pub fn event_channel() -> broadcast::Sender<ListingEvent> {
        broadcast::channel(EVENT_CAPACITY).0
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListingEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ListingEvent) {
        // No subscriber is fine: views attach lazily.
        let _ = self.events.send(event);
    }

    fn next_temporary_identity(&mut self, state: &ListingState) -> Result<Identity> {
        let present = state.store.all_identities();
        if let Some(source) = self.temp_ids.as_mut() {
            while let Some(id) = source
                .next_temporary()
                .filter(|id| *id <= Identity::MAX_MAGNITUDE)
            {
                let identity = Identity::Temporary(id);
                if !present.contains(&identity) && !state.tracker.was_promoted(id) {
                    return Ok(identity);
                }
            }
            warn!("commands: temporary id source exhausted; using fallback counter");
            self.temp_ids = None;
        }

        loop {
            let id = self.fallback_next;
            if id > Identity::MAX_MAGNITUDE {
                return Err(ListingError::Configuration(
                    "temporary id fallback counter exhausted".into(),
                ));
            }
            self.fallback_next = self.fallback_next.checked_add(1).ok_or_else(|| {
                ListingError::Configuration("temporary id fallback counter overflowed".into())
            })?;
            let identity = Identity::Temporary(id);
            if !present.contains(&identity) && !state.tracker.was_promoted(id) {
                return Ok(identity);
            }
        }
    }
}

impl ListingOps for CommandProcessor {
    fn name(&self) -> &'static str {
        "modular"
    }

    fn add_row(
        &mut self,
        state: &mut ListingState,
        initial: &BTreeMap<String, String>,
    ) -> Result<usize> {
        let identity = self.next_temporary_identity(state)?;
        let fields = state.schema.with_defaults(initial.clone());
        let position = state.store.append(Row::with_fields(identity, fields))?;
        state.tracker.record_add(identity);

        debug!(position, %identity, "commands: added row");
        self.emit(ListingEvent::RowInserted { position, identity });
        Ok(position)
    }

    fn delete_rows(&mut self, state: &mut ListingState, positions: &[usize]) -> Result<usize> {
        let unique: BTreeSet<usize> = positions.iter().copied().collect();
        let mut removed = Vec::with_capacity(unique.len());

        for position in unique.into_iter().rev() {
            let identity = match state.store.get(position) {
                Ok(row) => row.identity(),
                Err(err) => {
                    warn!(position, "commands: skipping delete: {err}");
                    continue;
                }
            };
            state.store.remove(position)?;
            match identity {
                Identity::Persisted(_) => state.tracker.record_delete(identity),
                Identity::Temporary(_) => {
                    state.tracker.cancel_add(identity);
                }
            }
            removed.push(position);
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), "commands: deleted rows");
            let count = removed.len();
            self.emit(ListingEvent::RowsRemoved { positions: removed });
            return Ok(count);
        }
        Ok(0)
    }

    fn update_cell(
        &mut self,
        state: &mut ListingState,
        position: usize,
        field: &str,
        value: &str,
    ) -> Result<bool> {
        if field == ID_FIELD {
            return Err(ListingError::Validation(
                "the id field cannot be edited".to_string(),
            ));
        }
        let row = state.store.get(position)?;
        if row.get(field).unwrap_or_default() == value {
            return Ok(false);
        }
        let identity = row.identity();

        state.store.set_field(position, field, value.to_string())?;
        // Temporary rows carry their edits inside the pending add.
        if identity.is_persisted() {
            state.tracker.record_field_update(identity, field, value);
        }

        self.emit(ListingEvent::CellChanged {
            position,
            field: field.to_string(),
            value: value.to_string(),
        });
        Ok(true)
    }

    fn change_manager(
        &mut self,
        state: &mut ListingState,
        positions: &[usize],
        manager: &str,
    ) -> Result<usize> {
        let unique: BTreeSet<usize> = positions.iter().copied().collect();
        let mut updated = 0;
        for position in unique {
            match self.update_cell(state, position, MANAGER_FIELD, manager) {
                Ok(_) => updated += 1,
                Err(err) => warn!(position, "commands: manager change skipped: {err}"),
            }
        }
        info!(updated, requested = positions.len(), manager, "commands: changed manager");
        Ok(updated)
    }

    fn promote_identity(
        &mut self,
        state: &mut ListingState,
        temp_id: u64,
        real_id: u64,
    ) -> Result<usize> {
        if state.tracker.was_promoted(temp_id) {
            return Err(ListingError::Validation(format!(
                "temporary row {temp_id} was already promoted"
            )));
        }
        let from = Identity::Temporary(temp_id);
        let to = Identity::Persisted(real_id);
        let position = state
            .store
            .find_position(from)
            .ok_or(ListingError::IdentityNotFound(from))?;

        state.store.set_identity(position, to)?;
        state.tracker.promote_identity(temp_id, real_id)?;

        info!(position, %from, %to, "commands: promoted row identity");
        self.emit(ListingEvent::IdentityPromoted { position, from, to });
        Ok(position)
    }

    fn load_rows(&mut self, state: &mut ListingState, rows: &[Row]) -> Result<usize> {
        let kept = state.store.replace_all(rows.to_vec());
        state.tracker.clear();
        self.emit(ListingEvent::Reset { rows: kept });
        Ok(kept)
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
