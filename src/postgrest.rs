use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde_json::Value;

use crate::http_client::APP_USER_AGENT;
use crate::retry::RetryPolicy;

/// The hosted datastore speaks PostgREST. Upserts are keyed on natural
/// composite keys via `on_conflict`, so repeated runs are idempotent.
#[derive(Debug, Clone)]
pub struct RestSink {
    pub base_url: String,
    pub api_key: String,
}

impl RestSink {
    /// Configured only when both SYNC_REST_URL and SYNC_REST_KEY are set;
    /// otherwise pipelines stay local-only.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SYNC_REST_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())?;
        let api_key = std::env::var("SYNC_REST_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;
        Some(Self { base_url, api_key })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

pub fn rest_select(
    client: &Client,
    sink: &RestSink,
    table: &str,
    select: &str,
    retry: &RetryPolicy,
) -> Result<Vec<Value>> {
    retry.run(&format!("select {table}"), || {
        let resp = client
            .get(sink.table_url(table))
            .query(&[("select", select)])
            .header("apikey", &sink.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", sink.api_key))
            .header(USER_AGENT, APP_USER_AGENT)
            .send()
            .context("rest select request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading rest body")?;
        if !status.is_success() {
            return Err(anyhow!("rest {table} {}: {}", status, body_snippet(&body)));
        }
        serde_json::from_str::<Vec<Value>>(&body).context("invalid rest json")
    })
}

pub fn rest_upsert(
    client: &Client,
    sink: &RestSink,
    table: &str,
    on_conflict: &str,
    rows: &[Value],
    retry: &RetryPolicy,
) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    retry.run(&format!("upsert {table}"), || {
        let resp = client
            .post(sink.table_url(table))
            .query(&[("on_conflict", on_conflict)])
            .header("apikey", &sink.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", sink.api_key))
            .header(USER_AGENT, APP_USER_AGENT)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .context("rest upsert request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("rest {table} {}: {}", status, body_snippet(&body)));
        }
        Ok(rows.len())
    })
}

fn body_snippet(body: &str) -> String {
    body.trim()
        .replace('\n', " ")
        .replace('\r', " ")
        .chars()
        .take(220)
        .collect()
}
