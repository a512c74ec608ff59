//! In-memory table of editable rows.
//!
//! Positions are plain indexes and shift on every structural change; callers
//! that remove several rows must go in descending position order.

use std::collections::{HashMap, HashSet};

use shared::domain::Identity;
use tracing::warn;

use crate::{
    error::{ListingError, Result},
    row::{Row, ID_FIELD},
};

#[derive(Debug, Clone, Default)]
pub struct RowStore {
    rows: Vec<Row>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Appends a row that already carries its identity; returns its position.
    pub fn append(&mut self, row: Row) -> Result<usize> {
        if self.find_position(row.identity()).is_some() {
            return Err(ListingError::Validation(format!(
                "row {} is already present",
                row.identity()
            )));
        }
        self.rows.push(row);
        Ok(self.rows.len() - 1)
    }

    pub fn get(&self, position: usize) -> Result<&Row> {
        self.rows.get(position).ok_or(ListingError::PositionNotFound {
            position,
            len: self.rows.len(),
        })
    }

    pub fn find_position(&self, identity: Identity) -> Option<usize> {
        self.rows.iter().position(|row| row.identity() == identity)
    }

    pub fn remove(&mut self, position: usize) -> Result<Row> {
        if position >= self.rows.len() {
            return Err(ListingError::PositionNotFound {
                position,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(position))
    }

    pub fn all_identities(&self) -> HashSet<Identity> {
        self.rows.iter().map(Row::identity).collect()
    }

    /// Identity to position lookup. Rebuild after any insert or remove.
    pub fn identity_map(&self) -> HashMap<Identity, usize> {
        self.rows
            .iter()
            .enumerate()
            .map(|(position, row)| (row.identity(), position))
            .collect()
    }

    /// Sets one field and returns the previous value.
    pub fn set_field(&mut self, position: usize, field: &str, value: String) -> Result<Option<String>> {
        if field == ID_FIELD {
            return Err(ListingError::Validation(
                "the id field is managed by the listing and cannot be edited".to_string(),
            ));
        }
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(position)
            .ok_or(ListingError::PositionNotFound { position, len })?;
        Ok(row.set(field, value))
    }

    pub fn set_identity(&mut self, position: usize, identity: Identity) -> Result<()> {
        if let Some(existing) = self.find_position(identity) {
            if existing != position {
                return Err(ListingError::Validation(format!(
                    "row {identity} is already present at position {existing}"
                )));
            }
        }
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(position)
            .ok_or(ListingError::PositionNotFound { position, len })?;
        row.set_identity(identity);
        Ok(())
    }

    /// Replaces the whole table. Later duplicates of an identity are dropped.
    pub fn replace_all(&mut self, rows: Vec<Row>) -> usize {
        let mut seen = HashSet::with_capacity(rows.len());
        self.rows = rows
            .into_iter()
            .filter(|row| {
                let fresh = seen.insert(row.identity());
                if !fresh {
                    warn!(identity = %row.identity(), "row store: dropping duplicate row on reload");
                }
                fresh
            })
            .collect();
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

#[cfg(test)]
#[path = "tests/row_store_tests.rs"]
mod tests;
