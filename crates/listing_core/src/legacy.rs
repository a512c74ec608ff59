//! The single-controller implementation the listing table started with. It has
//! no event stream and derives temporary ids from the table contents.

use std::collections::BTreeMap;

use shared::domain::Identity;
use tracing::{info, warn};

use crate::{
    error::{ListingError, Result},
    ops::ListingOps,
    row::{Row, ID_FIELD, MANAGER_FIELD},
    state::ListingState,
};

#[derive(Debug, Default)]
pub struct LegacyController;

impl LegacyController {
    pub fn new() -> Self {
        Self
    }
}

impl ListingOps for LegacyController {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn add_row(
        &mut self,
        state: &mut ListingState,
        initial: &BTreeMap<String, String>,
    ) -> Result<usize> {
        // One past the most negative id in the table.
        let mut next = state
            .store
            .iter()
            .filter_map(|row| match row.identity() {
                Identity::Temporary(n) => Some(n),
                Identity::Persisted(_) => None,
            })
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| ListingError::Configuration("temporary ids exhausted".into()))?;
        while state.tracker.was_promoted(next) {
            next += 1;
        }
        if next > Identity::MAX_MAGNITUDE {
            return Err(ListingError::Configuration("temporary ids exhausted".into()));
        }
        let identity = Identity::Temporary(next);

        let row = Row::with_fields(identity, state.schema.with_defaults(initial.clone()));
        let position = state.store.append(row)?;
        state.tracker.record_add(identity);
        info!(position, %identity, "legacy: added row");
        Ok(position)
    }

    fn delete_rows(&mut self, state: &mut ListingState, positions: &[usize]) -> Result<usize> {
        let mut ordered = positions.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        ordered.dedup();

        let mut removed = 0;
        for position in ordered {
            if position >= state.store.len() {
                warn!(position, "legacy: delete position out of range");
                continue;
            }
            let row = state.store.remove(position)?;
            if row.identity().is_persisted() {
                state.tracker.record_delete(row.identity());
            } else {
                state.tracker.cancel_add(row.identity());
            }
            removed += 1;
        }
        info!(removed, "legacy: deleted rows");
        Ok(removed)
    }

    fn update_cell(
        &mut self,
        state: &mut ListingState,
        position: usize,
        field: &str,
        value: &str,
    ) -> Result<bool> {
        if field == ID_FIELD {
            return Err(ListingError::Validation("the id field cannot be edited".into()));
        }
        let row = state.store.get(position)?;
        let identity = row.identity();
        if row.get(field).unwrap_or_default() == value {
            return Ok(false);
        }
        state.store.set_field(position, field, value.to_string())?;
        if identity.is_persisted() {
            state.tracker.record_field_update(identity, field, value);
        }
        Ok(true)
    }

    fn change_manager(
        &mut self,
        state: &mut ListingState,
        positions: &[usize],
        manager: &str,
    ) -> Result<usize> {
        let mut ordered = positions.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut updated = 0;
        for position in ordered {
            if self
                .update_cell(state, position, MANAGER_FIELD, manager)
                .is_ok()
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn promote_identity(
        &mut self,
        state: &mut ListingState,
        temp_id: u64,
        real_id: u64,
    ) -> Result<usize> {
        let from = Identity::Temporary(temp_id);
        let position = state
            .store
            .find_position(from)
            .ok_or(ListingError::IdentityNotFound(from))?;
        if state.tracker.was_promoted(temp_id) {
            return Err(ListingError::Validation(format!(
                "temporary row {temp_id} was already promoted"
            )));
        }
        state
            .store
            .set_identity(position, Identity::Persisted(real_id))?;
        state.tracker.promote_identity(temp_id, real_id)?;
        Ok(position)
    }

    fn load_rows(&mut self, state: &mut ListingState, rows: &[Row]) -> Result<usize> {
        state.tracker.clear();
        Ok(state.store.replace_all(rows.to_vec()))
    }
}

#[cfg(test)]
#[path = "tests/legacy_tests.rs"]
mod tests;
