//! Leaderboard backed by a PocketBase `reaction_records` collection

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reflex_core::{
    LeaderboardClient, LeaderboardEntry, LeaderboardError, LeaderboardResult, NewEntry,
};
use serde::Deserialize;
use tracing::{debug, info};

pub const COLLECTION: &str = "reaction_records";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct PocketBaseClient {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

/// A record as PocketBase returns it
#[derive(Debug, Deserialize)]
struct RecordWire {
    username: String,
    #[serde(rename = "reactionMs")]
    reaction_ms: u32,
    created: String,
}

#[derive(Debug, Deserialize)]
struct ListWire {
    items: Vec<RecordWire>,
}

impl RecordWire {
    fn into_entry(self) -> LeaderboardResult<LeaderboardEntry> {
        Ok(LeaderboardEntry {
            display_name: self.username,
            reaction_time_ms: self.reaction_ms,
            created_at: parse_timestamp(&self.created)?,
        })
    }
}

/// PocketBase writes `2024-03-09 10:00:00.123Z`; RFC 3339 is accepted too.
fn parse_timestamp(raw: &str) -> LeaderboardResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .map_err(|e| LeaderboardError::Decode(format!("bad timestamp {raw:?}: {e}")))
}

impl PocketBaseClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> LeaderboardResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LeaderboardError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn records_url(&self) -> String {
        format!("{}/api/collections/{COLLECTION}/records", self.base_url)
    }

    async fn check(resp: reqwest::Response) -> LeaderboardResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(LeaderboardError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn network(e: reqwest::Error) -> LeaderboardError {
    LeaderboardError::Network(e.to_string())
}

fn decode(e: reqwest::Error) -> LeaderboardError {
    LeaderboardError::Decode(e.to_string())
}

impl LeaderboardClient for PocketBaseClient {
    async fn create(&self, entry: NewEntry) -> LeaderboardResult<LeaderboardEntry> {
        debug!(url = %self.records_url(), "creating leaderboard record");
        let resp = self
            .http
            .post(self.records_url())
            .json(&entry)
            .send()
            .await
            .map_err(network)?;
        let record: RecordWire = Self::check(resp).await?.json().await.map_err(decode)?;
        let created = record.into_entry()?;
        info!(
            display_name = %created.display_name,
            reaction_ms = created.reaction_time_ms,
            "leaderboard record created"
        );
        Ok(created)
    }

    async fn list_ranked(&self) -> LeaderboardResult<Vec<LeaderboardEntry>> {
        let page_size = self.page_size.to_string();
        let resp = self
            .http
            .get(self.records_url())
            .query(&[("sort", "reactionMs"), ("perPage", page_size.as_str())])
            .send()
            .await
            .map_err(network)?;
        let list: ListWire = Self::check(resp).await?.json().await.map_err(decode)?;

        let mut entries = list
            .items
            .into_iter()
            .map(RecordWire::into_entry)
            .collect::<LeaderboardResult<Vec<_>>>()?;
        // The server sorts already; keep the contract even if it does not.
        entries.sort_by_key(|e| e.reaction_time_ms);
        Ok(entries)
    }
}
