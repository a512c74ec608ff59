use shared::domain::ListingKind;

use crate::{pending::PendingChangeTracker, row::TableSchema, row_store::RowStore};

/// One listing table together with its unsaved changes. Commands receive it
/// by `&mut` for the duration of a single operation.
#[derive(Debug, Clone)]
pub struct ListingState {
    pub schema: TableSchema,
    pub store: RowStore,
    pub tracker: PendingChangeTracker,
}

impl ListingState {
    pub fn new(kind: ListingKind) -> Self {
        Self {
            schema: TableSchema::for_kind(kind),
            store: RowStore::new(),
            tracker: PendingChangeTracker::new(),
        }
    }

    pub fn kind(&self) -> ListingKind {
        self.schema.kind()
    }
}
