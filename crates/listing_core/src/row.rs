//! Editable listing rows and per-table column schemas.

use std::collections::BTreeMap;

use serde_json::Value;
use shared::{
    domain::{Identity, ListingKind},
    protocol::WireRow,
};

use crate::error::{ListingError, Result};

pub const ID_FIELD: &str = "id";
pub const MANAGER_FIELD: &str = "manager";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    identity: Identity,
    fields: BTreeMap<String, String>,
}

impl Row {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn with_fields(identity: Identity, fields: BTreeMap<String, String>) -> Self {
        let mut row = Self::new(identity);
        for (field, value) in fields {
            if field != ID_FIELD {
                row.fields.insert(field, value);
            }
        }
        row
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Stores `value` and returns the previous one.
    pub(crate) fn set(&mut self, field: &str, value: String) -> Option<String> {
        self.fields.insert(field.to_string(), value)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn from_wire(wire: &WireRow) -> Result<Self> {
        let raw_id = wire
            .get(ID_FIELD)
            .ok_or_else(|| ListingError::Validation("row is missing required field 'id'".into()))?;
        let wire_id = match raw_id {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| ListingError::Validation(format!("row id is not an integer: {raw_id}")))?;

        let mut row = Self::new(Identity::from_wire(wire_id)?);
        for (field, value) in wire {
            if field == ID_FIELD {
                continue;
            }
            row.fields.insert(field.clone(), render_value(value));
        }
        Ok(row)
    }

    pub fn to_wire(&self) -> WireRow {
        let mut wire = WireRow::new();
        wire.insert(ID_FIELD.to_string(), Value::from(self.identity.to_wire()));
        for (field, value) in &self.fields {
            wire.insert(field.clone(), Value::String(value.clone()));
        }
        wire
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub default: &'static str,
}

const fn column(name: &'static str, default: &'static str) -> Column {
    Column { name, default }
}

const ONEROOM_COLUMNS: &[Column] = &[
    column("address", ""),
    column("dong", ""),
    column("ho", ""),
    column("room_type", "oneroom"),
    column("floor", ""),
    column("deposit", "0"),
    column("monthly_rent", "0"),
    column("maintenance_fee", "0"),
    column("owner_phone", ""),
    column(MANAGER_FIELD, ""),
    column("status", "available"),
    column("memo", ""),
];

const SHOP_COLUMNS: &[Column] = &[
    column("address", ""),
    column("floor", ""),
    column("area", ""),
    column("business_type", ""),
    column("deposit", "0"),
    column("monthly_rent", "0"),
    column("premium", "0"),
    column("owner_phone", ""),
    column(MANAGER_FIELD, ""),
    column("status", "available"),
    column("memo", ""),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    kind: ListingKind,
    columns: &'static [Column],
}

impl TableSchema {
    pub fn for_kind(kind: ListingKind) -> Self {
        let columns = match kind {
            ListingKind::Oneroom => ONEROOM_COLUMNS,
            ListingKind::Shop => SHOP_COLUMNS,
        };
        Self { kind, columns }
    }

    pub fn kind(&self) -> ListingKind {
        self.kind
    }

    pub fn columns(&self) -> &'static [Column] {
        self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Fills every schema column missing from `fields` with its default. Extra
    /// fields supplied by the caller are kept as-is.
    pub fn with_defaults(&self, mut fields: BTreeMap<String, String>) -> BTreeMap<String, String> {
        fields.remove(ID_FIELD);
        for column in self.columns {
            fields
                .entry(column.name.to_string())
                .or_insert_with(|| column.default.to_string());
        }
        fields
    }
}

#[cfg(test)]
#[path = "tests/row_tests.rs"]
mod tests;
