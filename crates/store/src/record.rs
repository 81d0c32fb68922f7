//! Mapping between raw store records and the typed [`BatchRecord`].
//!
//! Stored field conventions:
//! - `Request IDs` is a JSON-encoded string array. Malformed JSON
//!   degrades to an empty list (logged), never a crash.
//! - `Seen IDs` / `Failed IDs` are comma-delimited id sets.
//! - `Output` is a newline-delimited URL list, append-only.
//! - `Created at` / `Last Update` / `Completed at` are RFC 3339; a
//!   missing `Created at` falls back to the record's `createdTime`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use wavebatch_core::batch::{BatchRecord, BatchStatus};
use wavebatch_core::idset::parse_id_set;

use crate::BatchPatch;

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

pub const FIELD_PROMPT: &str = "Prompt";
pub const FIELD_REQUEST_IDS: &str = "Request IDs";
pub const FIELD_SEEN_IDS: &str = "Seen IDs";
pub const FIELD_FAILED_IDS: &str = "Failed IDs";
pub const FIELD_OUTPUT: &str = "Output";
pub const FIELD_STATUS: &str = "Status";
pub const FIELD_CREATED_AT: &str = "Created at";
pub const FIELD_LAST_UPDATE: &str = "Last Update";
pub const FIELD_COMPLETED_AT: &str = "Completed at";

// ---------------------------------------------------------------------------
// Raw record shape
// ---------------------------------------------------------------------------

/// One record as returned by the store API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    /// Store-assigned record id.
    pub id: String,
    /// Store-side creation time.
    #[serde(rename = "createdTime", default)]
    pub created_time: Option<DateTime<Utc>>,
    /// Raw field map.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// List-endpoint envelope (`{"records": [...]}`).
#[derive(Debug, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the JSON-encoded request-id list, degrading to an empty list
/// on malformed content.
pub fn parse_request_ids(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(ids) => ids,
        Err(err) => {
            tracing::warn!(error = %err, "Malformed Request IDs field, treating as empty");
            Vec::new()
        }
    }
}

/// Parse the newline-delimited output list.
pub fn parse_outputs(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn field_str<'a>(fields: &'a Map<String, Value>, name: &str) -> &'a str {
    fields.get(name).and_then(Value::as_str).unwrap_or_default()
}

/// Build the typed view of a raw record.
pub fn from_raw(raw: &RawRecord) -> BatchRecord {
    let created_at = field_str(&raw.fields, FIELD_CREATED_AT)
        .parse::<DateTime<Utc>>()
        .ok()
        .or(raw.created_time)
        .unwrap_or_else(Utc::now);

    let last_update = field_str(&raw.fields, FIELD_LAST_UPDATE)
        .parse::<DateTime<Utc>>()
        .ok();

    BatchRecord {
        id: raw.id.clone(),
        request_ids: parse_request_ids(field_str(&raw.fields, FIELD_REQUEST_IDS)),
        seen_ids: parse_id_set(field_str(&raw.fields, FIELD_SEEN_IDS)),
        failed_ids: parse_id_set(field_str(&raw.fields, FIELD_FAILED_IDS)),
        outputs: parse_outputs(field_str(&raw.fields, FIELD_OUTPUT)),
        status: BatchStatus::parse(field_str(&raw.fields, FIELD_STATUS)),
        created_at,
        last_update,
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Fields for a freshly created batch record.
pub fn new_batch_fields(prompt: &str, created_at: DateTime<Utc>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(FIELD_PROMPT.into(), Value::String(prompt.to_string()));
    fields.insert(
        FIELD_STATUS.into(),
        Value::String(BatchStatus::Processing.as_str().to_string()),
    );
    fields.insert(FIELD_REQUEST_IDS.into(), Value::String("[]".into()));
    fields.insert(FIELD_SEEN_IDS.into(), Value::String(String::new()));
    fields.insert(FIELD_FAILED_IDS.into(), Value::String(String::new()));
    fields.insert(FIELD_OUTPUT.into(), Value::String(String::new()));
    fields.insert(
        FIELD_CREATED_AT.into(),
        Value::String(created_at.to_rfc3339()),
    );
    fields
}

/// Convert a [`BatchPatch`] to the stored field map for a PATCH call.
pub fn patch_fields(patch: &BatchPatch) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(ids) = &patch.request_ids {
        // Stored as a JSON-encoded string, not a native array.
        let encoded = serde_json::to_string(ids).unwrap_or_else(|_| "[]".into());
        fields.insert(FIELD_REQUEST_IDS.into(), Value::String(encoded));
    }
    if let Some(seen) = &patch.seen_ids {
        fields.insert(
            FIELD_SEEN_IDS.into(),
            Value::String(wavebatch_core::idset::join_id_set(seen)),
        );
    }
    if let Some(failed) = &patch.failed_ids {
        fields.insert(
            FIELD_FAILED_IDS.into(),
            Value::String(wavebatch_core::idset::join_id_set(failed)),
        );
    }
    if let Some(outputs) = &patch.outputs {
        fields.insert(FIELD_OUTPUT.into(), Value::String(outputs.join("\n")));
    }
    if let Some(status) = patch.status {
        fields.insert(FIELD_STATUS.into(), Value::String(status.as_str().into()));
    }
    if let Some(ts) = patch.completed_at {
        fields.insert(FIELD_COMPLETED_AT.into(), Value::String(ts.to_rfc3339()));
    }
    if let Some(ts) = patch.last_update {
        fields.insert(FIELD_LAST_UPDATE.into(), Value::String(ts.to_rfc3339()));
    }
    fields
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(fields: Value) -> RawRecord {
        RawRecord {
            id: "rec1".into(),
            created_time: Some("2026-08-01T00:00:00Z".parse().unwrap()),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    // -- request-id parsing --

    #[test]
    fn request_ids_parse_json_array() {
        assert_eq!(
            parse_request_ids(r#"["a","b"]"#),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn malformed_request_ids_degrade_to_empty() {
        assert!(parse_request_ids("not json").is_empty());
        assert!(parse_request_ids("{").is_empty());
    }

    #[test]
    fn blank_request_ids_are_empty() {
        assert!(parse_request_ids("   ").is_empty());
    }

    // -- typed view --

    #[test]
    fn from_raw_maps_all_fields() {
        let rec = from_raw(&raw(json!({
            "Prompt": "a cat",
            "Request IDs": r#"["j1","j2"]"#,
            "Seen IDs": "j1",
            "Failed IDs": "",
            "Output": "https://a\nhttps://b",
            "Status": "processing",
            "Created at": "2026-08-02T10:00:00Z",
        })));
        assert_eq!(rec.request_ids, vec!["j1".to_string(), "j2".to_string()]);
        assert!(rec.seen_ids.contains("j1"));
        assert!(rec.failed_ids.is_empty());
        assert_eq!(rec.outputs.len(), 2);
        assert_eq!(
            rec.created_at,
            "2026-08-02T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn created_at_falls_back_to_created_time() {
        let rec = from_raw(&raw(json!({"Status": "processing"})));
        assert_eq!(
            rec.created_at,
            "2026-08-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    // -- patch serialization --

    #[test]
    fn patch_fields_encode_stored_forms() {
        let patch = BatchPatch {
            request_ids: Some(vec!["j1".into()]),
            seen_ids: Some(["j1".to_string()].into()),
            outputs: Some(vec!["https://a".into(), "https://b".into()]),
            status: Some(BatchStatus::Completed),
            ..Default::default()
        };
        let fields = patch_fields(&patch);
        assert_eq!(fields[FIELD_REQUEST_IDS], json!(r#"["j1"]"#));
        assert_eq!(fields[FIELD_SEEN_IDS], json!("j1"));
        assert_eq!(fields[FIELD_OUTPUT], json!("https://a\nhttps://b"));
        assert_eq!(fields[FIELD_STATUS], json!("completed"));
        assert!(!fields.contains_key(FIELD_FAILED_IDS));
    }

    #[test]
    fn roundtrip_through_raw_record() {
        let patch = BatchPatch {
            request_ids: Some(vec!["j1".into(), "j2".into()]),
            seen_ids: Some(["j2".to_string()].into()),
            failed_ids: Some(["j1".to_string()].into()),
            outputs: Some(vec!["https://x".into()]),
            ..Default::default()
        };
        let mut fields = new_batch_fields("p", Utc::now());
        fields.extend(patch_fields(&patch));
        let rec = from_raw(&RawRecord {
            id: "rec9".into(),
            created_time: None,
            fields,
        });
        assert_eq!(rec.request_ids.len(), 2);
        assert!(rec.seen_ids.contains("j2"));
        assert!(rec.failed_ids.contains("j1"));
        assert_eq!(rec.outputs, vec!["https://x".to_string()]);
    }
}
