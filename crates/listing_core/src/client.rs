//! HTTP access to the mylist endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use shared::{
    domain::ListingKind,
    protocol::{LoadQuery, LoadResponse, SaveRequest, SaveResponse},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{ListingError, Result},
    row::Row,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct LoadedListing {
    pub kind: ListingKind,
    pub rows: Vec<Row>,
    pub fetched_at: DateTime<Utc>,
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_rows(&self, kind: ListingKind, manager: &str, role: &str)
        -> Result<LoadedListing>;
    /// Resolves only for an "ok" save; any other status is a transport error.
    async fn save_changes(&self, kind: ListingKind, request: &SaveRequest) -> Result<SaveResponse>;
}

#[derive(Debug, Clone)]
pub struct ListingClient {
    http: Client,
    server_url: String,
}

impl ListingClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(server_url).map_err(|err| {
            ListingError::Configuration(format!("invalid server url '{server_url}': {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ListingError::Configuration(format!(
                "server url must start with http:// or https://, got '{server_url}'"
            )));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ListingError::Configuration(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

async fn read_body(response: Response, path: &str) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(ListingError::Transport(format!("{path} returned HTTP {status}")));
    }
    Ok(response.text().await?)
}

#[async_trait]
impl ListingSource for ListingClient {
    async fn fetch_rows(
        &self,
        kind: ListingKind,
        manager: &str,
        role: &str,
    ) -> Result<LoadedListing> {
        let path = kind.load_path();
        debug!(kind = kind.as_str(), manager, role, "listing: requesting rows");
        let response = self
            .http
            .get(self.endpoint(&path))
            .query(&LoadQuery {
                manager: manager.to_string(),
                role: role.to_string(),
            })
            .send()
            .await?;
        let body = read_body(response, &path).await?;
        let envelope: LoadResponse = serde_json::from_str(&body)?;
        if !envelope.is_ok() {
            let message = envelope.failure_message();
            warn!(kind = kind.as_str(), status = %envelope.status, "listing: load rejected: {message}");
            return Err(ListingError::Transport(message));
        }

        let rows = envelope
            .data
            .unwrap_or_default()
            .iter()
            .map(Row::from_wire)
            .collect::<Result<Vec<_>>>()?;
        info!(kind = kind.as_str(), rows = rows.len(), "listing: loaded rows");
        Ok(LoadedListing {
            kind,
            rows,
            fetched_at: Utc::now(),
        })
    }

    async fn save_changes(&self, kind: ListingKind, request: &SaveRequest) -> Result<SaveResponse> {
        let path = kind.save_path();
        let response = self
            .http
            .post(self.endpoint(&path))
            .json(request)
            .send()
            .await?;
        let body = read_body(response, &path).await?;
        let envelope: SaveResponse = serde_json::from_str(&body)?;
        if !envelope.is_ok() {
            return Err(ListingError::Transport(envelope.failure_message()));
        }
        info!(
            kind = kind.as_str(),
            added = request.added.len(),
            updated = request.updated.len(),
            deleted = request.deleted.len(),
            assigned = envelope.id_map.len(),
            "listing: saved changes"
        );
        Ok(envelope)
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
