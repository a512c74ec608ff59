use std::collections::BTreeMap;

use crate::{error::Result, row::Row, state::ListingState};

/// Table-editing operations served by either the legacy controller or the
/// modular command stack. Every call must leave `state` untouched when it
/// returns an error.
pub trait ListingOps {
    fn name(&self) -> &'static str;

    /// Appends a new unsaved row and returns its position.
    fn add_row(
        &mut self,
        state: &mut ListingState,
        initial: &BTreeMap<String, String>,
    ) -> Result<usize>;

    /// Returns how many rows were removed.
    fn delete_rows(&mut self, state: &mut ListingState, positions: &[usize]) -> Result<usize>;

    /// Returns `false` when `value` already matched the stored value.
    fn update_cell(
        &mut self,
        state: &mut ListingState,
        position: usize,
        field: &str,
        value: &str,
    ) -> Result<bool>;

    /// Returns how many rows ended up with `manager`.
    fn change_manager(
        &mut self,
        state: &mut ListingState,
        positions: &[usize],
        manager: &str,
    ) -> Result<usize>;

    /// Swaps a temporary identity for the one the server assigned, in the
    /// store and in the pending changes. Returns the row position.
    fn promote_identity(
        &mut self,
        state: &mut ListingState,
        temp_id: u64,
        real_id: u64,
    ) -> Result<usize>;

    /// Replaces the whole table and drops all pending changes.
    fn load_rows(&mut self, state: &mut ListingState, rows: &[Row]) -> Result<usize>;
}
