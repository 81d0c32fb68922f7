//! Request/response types and the duck-typed payload readers.
//!
//! WaveSpeed responses are not uniform: the job id may arrive as `id`,
//! `requestId`, or nested under `data`; outputs may be bare URL strings
//! or objects carrying a `url` field. Everything here parses leniently
//! and fails closed: unrecognized shapes produce `None` or empty lists
//! rather than errors.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Remote lifecycle state of one generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted, not yet running.
    Queued,
    /// Currently generating.
    Processing,
    /// Finished with outputs. Terminal.
    Succeeded,
    /// Finished without outputs. Terminal.
    Failed,
    /// Unrecognized status string; treated as non-terminal so the
    /// sweep keeps polling instead of acting on a shape it does not
    /// understand.
    Other,
}

impl JobStatus {
    /// Parse the remote status string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "created" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "succeeded" | "completed" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Other,
        }
    }

    /// True for `Succeeded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// Submit / poll payloads
// ---------------------------------------------------------------------------

/// One sub-job submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitJobRequest {
    /// Generation prompt text.
    pub prompt: String,
    /// Base64 data URIs: subject image first, then reference images.
    pub images: Vec<String>,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Callback URL WaveSpeed posts the completion webhook to.
    pub webhook_url: String,
}

/// Snapshot of a job returned by a status poll.
#[derive(Debug, Clone)]
pub struct JobPoll {
    /// Current remote status.
    pub status: JobStatus,
    /// Output URLs, present once the job has succeeded.
    pub outputs: Vec<String>,
}

// ---------------------------------------------------------------------------
// Lenient payload readers
// ---------------------------------------------------------------------------

/// Pull a job id out of a response or webhook body.
///
/// Checks `id`, `requestId`, and `data.id` in that order.
pub fn extract_job_id(body: &serde_json::Value) -> Option<String> {
    for candidate in [
        body.get("id"),
        body.get("requestId"),
        body.get("data").and_then(|d| d.get("id")),
    ] {
        if let Some(id) = candidate.and_then(|v| v.as_str()) {
            let id = id.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// Pull a status string out of a response or webhook body
/// (`status` or `data.status`).
pub fn extract_status(body: &serde_json::Value) -> Option<JobStatus> {
    body.get("status")
        .or_else(|| body.get("data").and_then(|d| d.get("status")))
        .and_then(|v| v.as_str())
        .map(JobStatus::parse)
}

/// Collect output URLs from `outputs` or `data.outputs`.
///
/// Each entry may be a bare string or an object with a `url` field;
/// anything else is dropped.
pub fn extract_outputs(body: &serde_json::Value) -> Vec<String> {
    let list = body
        .get("outputs")
        .or_else(|| body.get("data").and_then(|d| d.get("outputs")))
        .and_then(|v| v.as_array());

    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| {
            entry
                .as_str()
                .or_else(|| entry.get("url").and_then(|u| u.as_str()))
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- status parsing --

    #[test]
    fn parses_known_statuses() {
        assert_eq!(JobStatus::parse("queued"), JobStatus::Queued);
        assert_eq!(JobStatus::parse("processing"), JobStatus::Processing);
        assert_eq!(JobStatus::parse("succeeded"), JobStatus::Succeeded);
        assert_eq!(JobStatus::parse("failed"), JobStatus::Failed);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(JobStatus::parse(" Succeeded "), JobStatus::Succeeded);
    }

    #[test]
    fn unknown_status_is_other_and_nonterminal() {
        let status = JobStatus::parse("banana");
        assert_eq!(status, JobStatus::Other);
        assert!(!status.is_terminal());
    }

    // -- job id extraction --

    #[test]
    fn id_from_top_level() {
        assert_eq!(
            extract_job_id(&json!({"id": "j1"})),
            Some("j1".to_string())
        );
    }

    #[test]
    fn id_from_request_id_field() {
        assert_eq!(
            extract_job_id(&json!({"requestId": "j2"})),
            Some("j2".to_string())
        );
    }

    #[test]
    fn id_from_nested_data() {
        assert_eq!(
            extract_job_id(&json!({"data": {"id": "j3"}})),
            Some("j3".to_string())
        );
    }

    #[test]
    fn missing_or_blank_id_is_none() {
        assert_eq!(extract_job_id(&json!({"id": "  "})), None);
        assert_eq!(extract_job_id(&json!({"other": 1})), None);
    }

    // -- outputs extraction --

    #[test]
    fn outputs_accept_strings_and_url_objects() {
        let body = json!({"outputs": ["https://a", {"url": "https://b"}, {"no_url": 1}, ""]});
        assert_eq!(
            extract_outputs(&body),
            vec!["https://a".to_string(), "https://b".to_string()]
        );
    }

    #[test]
    fn outputs_from_nested_data() {
        let body = json!({"data": {"outputs": ["https://x"]}});
        assert_eq!(extract_outputs(&body), vec!["https://x".to_string()]);
    }

    #[test]
    fn absent_outputs_yield_empty_list() {
        assert!(extract_outputs(&json!({})).is_empty());
    }
}
