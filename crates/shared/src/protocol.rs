use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{domain::Identity, error::ApiError};

pub const STATUS_OK: &str = "ok";

/// A row object as it travels over the wire: `id` plus arbitrary scalar fields.
pub type WireRow = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadQuery {
    pub manager: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<Vec<WireRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl LoadResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn failure_message(&self) -> String {
        failure_message(&self.status, self.message.as_deref(), self.error.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub id: Identity,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveRequest {
    pub manager: String,
    pub added: Vec<WireRow>,
    pub updated: Vec<FieldUpdate>,
    pub deleted: Vec<Identity>,
}

impl SaveRequest {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub status: String,
    /// Temporary wire id (as a string key) to the id the server assigned.
    #[serde(default)]
    pub id_map: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl SaveResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn failure_message(&self) -> String {
        failure_message(&self.status, self.message.as_deref(), self.error.as_ref())
    }

    /// Parsed `(old temporary wire id, new wire id)` pairs; malformed keys are skipped.
    pub fn id_assignments(&self) -> Vec<(i64, i64)> {
        self.id_map
            .iter()
            .filter_map(|(old, new)| old.trim().parse::<i64>().ok().map(|old| (old, *new)))
            .collect()
    }
}

fn failure_message(status: &str, message: Option<&str>, error: Option<&ApiError>) -> String {
    if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
        return message.to_string();
    }
    if let Some(error) = error {
        return format!("{:?}: {}", error.code, error.message);
    }
    format!("server returned status '{status}'")
}
