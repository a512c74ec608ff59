//! Bookkeeping for edits that have not been confirmed by the server yet.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use shared::{
    domain::Identity,
    protocol::{FieldUpdate, SaveRequest},
};
use tracing::{debug, warn};

use crate::{
    error::{ListingError, Result},
    row::ID_FIELD,
    row_store::RowStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange {
    Add(Identity),
    Update {
        identity: Identity,
        field: String,
        value: String,
    },
    Delete(Identity),
}

impl PendingChange {
    pub fn identity(&self) -> Identity {
        match self {
            Self::Add(identity) | Self::Delete(identity) => *identity,
            Self::Update { identity, .. } => *identity,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingChangeTracker {
    adds: Vec<Identity>,
    updates: BTreeMap<(Identity, String), String>,
    deletes: Vec<Identity>,
    /// Temporary id -> persisted id, for every promotion seen so far.
    promotions: HashMap<u64, u64>,
}

impl PendingChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.adds.len() + self.updates.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_add(&self, identity: Identity) -> bool {
        self.adds.contains(&self.resolve(identity))
    }

    pub fn was_promoted(&self, temp_id: u64) -> bool {
        self.promotions.contains_key(&temp_id)
    }

    pub fn record_add(&mut self, identity: Identity) {
        let identity = self.resolve(identity);
        if !self.adds.contains(&identity) {
            self.adds.push(identity);
        }
    }

    /// A delete of a row the server never saw only cancels its add.
    pub fn record_delete(&mut self, identity: Identity) {
        let identity = self.resolve(identity);
        if identity.is_temporary() {
            self.cancel_add(identity);
            return;
        }
        self.adds.retain(|added| *added != identity);
        self.updates.retain(|(updated, _), _| *updated != identity);
        if !self.deletes.contains(&identity) {
            self.deletes.push(identity);
        }
    }

    /// Last write wins per `(identity, field)`.
    pub fn record_field_update(&mut self, identity: Identity, field: &str, value: &str) {
        let identity = self.resolve(identity);
        self.updates
            .insert((identity, field.to_string()), value.to_string());
    }

    /// Removes a recorded add and any edits made to that row. Returns whether an
    /// add was present.
    pub fn cancel_add(&mut self, identity: Identity) -> bool {
        let identity = self.resolve(identity);
        let before = self.adds.len();
        self.adds.retain(|added| *added != identity);
        self.updates.retain(|(updated, _), _| *updated != identity);
        before != self.adds.len()
    }

    /// Rewrites every change that references `Temporary(temp_id)` so it
    /// references `Persisted(real_id)` instead. The pending add is dropped: a
    /// row with a persisted id already exists on the server. Later records
    /// made against the temporary identity are redirected as well.
    pub fn promote_identity(&mut self, temp_id: u64, real_id: u64) -> Result<usize> {
        if let Some(existing) = self.promotions.get(&temp_id) {
            return Err(ListingError::Validation(format!(
                "temporary row {temp_id} was already promoted to {existing}"
            )));
        }
        let temp = Identity::Temporary(temp_id);
        let real = Identity::Persisted(real_id);
        let mut rewritten = 0;

        let adds_before = self.adds.len();
        self.adds.retain(|added| *added != temp);
        rewritten += adds_before - self.adds.len();
        let stale: Vec<(Identity, String)> = self
            .updates
            .keys()
            .filter(|(identity, _)| *identity == temp)
            .cloned()
            .collect();
        for key in stale {
            if let Some(value) = self.updates.remove(&key) {
                self.updates.insert((real, key.1), value);
                rewritten += 1;
            }
        }
        for deleted in &mut self.deletes {
            if *deleted == temp {
                *deleted = real;
                rewritten += 1;
            }
        }

        self.promotions.insert(temp_id, real_id);
        debug!(temp_id, real_id, rewritten, "pending: promoted temporary identity");
        Ok(rewritten)
    }

    /// Adds first, then field updates, then deletes.
    pub fn changes(&self) -> Vec<PendingChange> {
        let mut changes = Vec::with_capacity(self.len());
        changes.extend(self.adds.iter().copied().map(PendingChange::Add));
        changes.extend(
            self.updates
                .iter()
                .map(|((identity, field), value)| PendingChange::Update {
                    identity: *identity,
                    field: field.clone(),
                    value: value.clone(),
                }),
        );
        changes.extend(self.deletes.iter().copied().map(PendingChange::Delete));
        changes
    }

    pub fn clear(&mut self) {
        self.adds.clear();
        self.updates.clear();
        self.deletes.clear();
        self.promotions.clear();
    }

    /// Drops every change recorded for `identity`.
    pub fn forget(&mut self, identity: Identity) {
        let identity = self.resolve(identity);
        self.adds.retain(|added| *added != identity);
        self.updates.retain(|(updated, _), _| *updated != identity);
        self.deletes.retain(|deleted| *deleted != identity);
    }

    /// Builds the save envelope. Only rows that are still temporary are sent as
    /// additions.
    pub fn to_save_request(&self, store: &RowStore, manager: &str) -> SaveRequest {
        let added = self
            .adds
            .iter()
            .filter(|identity| identity.is_temporary())
            .filter_map(|identity| store.find_position(*identity))
            .filter_map(|position| store.get(position).ok())
            .map(|row| row.to_wire())
            .collect();
        let updated = self
            .updates
            .iter()
            .filter(|((identity, _), _)| identity.is_persisted())
            .map(|((identity, field), value)| FieldUpdate {
                id: *identity,
                field: field.clone(),
                value: value.clone(),
            })
            .collect();
        SaveRequest {
            manager: manager.to_string(),
            added,
            updated,
            deleted: self.deletes.clone(),
        }
    }

    /// Forgets what the server confirmed from `sent`. Edits made after the
    /// request was built stay pending: a sent row that now has its persisted
    /// id gets a field update for every value that differs from what was
    /// sent, and a sent row still without one keeps its add if it changed.
    pub fn acknowledge(&mut self, sent: &SaveRequest, store: &RowStore) {
        for wire in &sent.added {
            let identity = wire
                .get(ID_FIELD)
                .and_then(Value::as_i64)
                .and_then(|id| Identity::from_wire(id).ok());
            let Some(identity) = identity.map(|identity| self.resolve(identity)) else {
                continue;
            };
            let drifted: Vec<(String, String)> = store
                .find_position(identity)
                .and_then(|position| store.get(position).ok())
                .map(|row| {
                    row.fields()
                        .iter()
                        .filter(|(field, value)| {
                            wire.get(field.as_str()).and_then(Value::as_str) != Some(value.as_str())
                        })
                        .map(|(field, value)| (field.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default();

            if identity.is_temporary() && !drifted.is_empty() {
                warn!(%identity, "pending: new row changed while its save was in flight and got no id; keeping it pending");
                continue;
            }
            self.adds.retain(|added| *added != identity);
            for (field, value) in drifted {
                self.record_field_update(identity, &field, &value);
            }
        }
        for update in &sent.updated {
            let key = (self.resolve(update.id), update.field.clone());
            if self.updates.get(&key) == Some(&update.value) {
                self.updates.remove(&key);
            }
        }
        for deleted in &sent.deleted {
            let deleted = self.resolve(*deleted);
            self.deletes.retain(|d| *d != deleted);
        }
    }

    fn resolve(&self, identity: Identity) -> Identity {
        match identity {
            Identity::Temporary(temp_id) => self
                .promotions
                .get(&temp_id)
                .map(|real_id| Identity::Persisted(*real_id))
                .unwrap_or(identity),
            persisted => persisted,
        }
    }
}

#[cfg(test)]
#[path = "tests/pending_tests.rs"]
mod tests;
