//! REST client for the tabular record store (Airtable v0 dialect).
//!
//! Endpoints used: `POST /{base}/{table}` (create),
//! `GET /{base}/{table}/{id}`, `PATCH /{base}/{table}/{id}`, and
//! `GET /{base}/{table}?filterByFormula=...` for the two list queries
//! the pipeline needs.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use wavebatch_core::batch::BatchRecord;

use crate::record::{self, RawRecord, RecordPage, FIELD_REQUEST_IDS, FIELD_STATUS};
use crate::{BatchPatch, RecordStore};

/// Upper bound on records fetched per sweep cycle.
const LIST_PAGE_SIZE: u32 = 50;

/// Errors from the record-store REST layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store returned a non-2xx status code.
    #[error("Record store error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl StoreError {
    /// True for failures worth retrying on their own merits (transport
    /// errors and 5xx). Retries are currently uniform regardless.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Request(_) => true,
            StoreError::Api { status, .. } => *status >= 500,
        }
    }
}

/// HTTP client for one table of the remote record store.
pub struct TableStore {
    client: reqwest::Client,
    api_url: String,
    base_id: String,
    table: String,
    api_key: String,
}

impl TableStore {
    /// Create a new client.
    ///
    /// * `api_url` - Base URL, e.g. `https://api.airtable.com/v0`.
    /// * `base_id` / `table` - Which table holds the batch records.
    /// * `api_key` - Bearer token.
    pub fn new(api_url: String, base_id: String, table: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            base_id,
            table,
            api_key,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/{}/{}", self.api_url, self.base_id, self.table)
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Run a `filterByFormula` list query.
    async fn list_with_formula(&self, formula: &str) -> Result<Vec<BatchRecord>, StoreError> {
        let max_records = LIST_PAGE_SIZE.to_string();
        let response = self
            .client
            .get(self.table_url())
            .bearer_auth(&self.api_key)
            .query(&[
                ("filterByFormula", formula),
                ("maxRecords", max_records.as_str()),
            ])
            .send()
            .await?;

        let page: RecordPage = Self::parse_response(response).await?;
        Ok(page.records.iter().map(record::from_raw).collect())
    }
}

/// Strip characters that would break out of a single-quoted formula
/// string. Job ids are opaque remote identifiers, so dropping quotes
/// and backslashes loses nothing legitimate.
fn sanitize_formula_arg(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\'' | '"' | '\\'))
        .collect()
}

#[async_trait]
impl RecordStore for TableStore {
    async fn create(&self, prompt: &str) -> Result<BatchRecord, StoreError> {
        let body = json!({ "fields": record::new_batch_fields(prompt, Utc::now()) });

        let response = self
            .client
            .post(self.table_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let raw: RawRecord = Self::parse_response(response).await?;
        Ok(record::from_raw(&raw))
    }

    async fn get(&self, id: &str) -> Result<BatchRecord, StoreError> {
        let response = self
            .client
            .get(format!("{}/{}", self.table_url(), id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let raw: RawRecord = Self::parse_response(response).await?;
        Ok(record::from_raw(&raw))
    }

    async fn update(&self, id: &str, patch: BatchPatch) -> Result<(), StoreError> {
        let body = json!({ "fields": record::patch_fields(&patch) });

        let response = self
            .client
            .patch(format!("{}/{}", self.table_url(), id))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn list_processing(&self) -> Result<Vec<BatchRecord>, StoreError> {
        let formula = format!("{{{FIELD_STATUS}}}='processing'");
        self.list_with_formula(&formula).await
    }

    async fn find_processing_containing(
        &self,
        job_id: &str,
    ) -> Result<Option<BatchRecord>, StoreError> {
        let needle = sanitize_formula_arg(job_id);
        let formula = format!(
            "AND({{{FIELD_STATUS}}}='processing', FIND('{needle}', {{{FIELD_REQUEST_IDS}}}))"
        );
        let mut records = self.list_with_formula(&formula).await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.remove(0))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
