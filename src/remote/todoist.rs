//! Todoist sync API client.
//!
//! Uses the `completed/get_all` endpoint, authenticated with a personal API
//! token sent as a bearer header.

use crate::error::{Error, Result};
use crate::model::CompletedItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

use super::{CompletedSource, clamp_limit};

/// Production Todoist API host.
pub const DEFAULT_ENDPOINT: &str = "https://api.todoist.com";

const COMPLETED_PATH: &str = "/sync/v9/completed/get_all";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for Todoist's completed-items feed.
pub struct TodoistClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl TodoistClient {
    /// Create a client against the production API.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_endpoint(token, DEFAULT_ENDPOINT)
    }

    /// Create a client against a custom host (self-hosted proxies, tests).
    pub fn with_endpoint(token: impl Into<String>, endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn completed_url(&self) -> String {
        format!("{}{COMPLETED_PATH}", self.endpoint)
    }
}

/// Query parameters for one completed-items request.
fn completed_query(since: DateTime<Utc>, limit: u32) -> [(&'static str, String); 2] {
    [
        ("since", since.format("%Y-%m-%dT%H:%M:%S").to_string()),
        ("limit", clamp_limit(i64::from(limit)).to_string()),
    ]
}

/// Response body of `completed/get_all`.
#[derive(Debug, Deserialize)]
struct CompletedResponse {
    #[serde(default)]
    items: Vec<ApiCompletedItem>,
}

#[derive(Debug, Deserialize)]
struct ApiCompletedItem {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(deserialize_with = "de_id")]
    task_id: String,
    content: String,
    completed_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_id")]
    project_id: String,
}

impl From<ApiCompletedItem> for CompletedItem {
    fn from(item: ApiCompletedItem) -> Self {
        CompletedItem::new(
            item.id,
            item.task_id,
            item.content,
            item.completed_at,
            item.project_id,
        )
    }
}

/// Older API versions send numeric ids, newer ones strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

fn parse_completed(body: &str) -> Result<Vec<CompletedItem>> {
    let data: CompletedResponse = serde_json::from_str(body)
        .map_err(|e| Error::RemoteFetch(format!("Failed to parse Todoist response: {e}")))?;
    Ok(data.items.into_iter().map(CompletedItem::from).collect())
}

impl CompletedSource for TodoistClient {
    async fn fetch_completed(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<CompletedItem>> {
        let query = completed_query(since, limit);
        debug!(since = %query[0].1, limit = %query[1].1, "Requesting completed items");

        let response = self
            .client
            .get(self.completed_url())
            .bearer_auth(&self.token)
            .query(&query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::RemoteFetch(format!("request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::RemoteAuth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteFetch(format!("HTTP {status}: {}", body.trim())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::RemoteFetch(format!("failed to read response: {e}")))?;
        let items = parse_completed(&body)?;

        debug!(count = items.len(), "Received completed items");
        Ok(items)
    }
}
