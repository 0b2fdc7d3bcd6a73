//! Typed payloads and the status envelope every endpoint shares.
//!
//! Responses are JSON objects carrying `status: "ok"` plus the payload
//! fields, or `status: "error"` plus a `message`. Decoding is strict
//! about the envelope and tolerant about extras, so newer services with
//! more fields keep working.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ApiError;

/// Result of an archive upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployed {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub version: String,
    /// Number of spiders the service discovered in the uploaded code.
    #[serde(default)]
    pub spiders: u64,
}

/// Result of scheduling one spider run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduled {
    pub jobid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionList {
    #[serde(default)]
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiderList {
    #[serde(default)]
    pub spiders: Vec<String>,
}

/// One job in a listing bucket. Timestamps stay strings; services differ
/// on their format and we only display them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub spider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// Jobs grouped by state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub pending: Vec<Job>,
    #[serde(default)]
    pub running: Vec<Job>,
    #[serde(default)]
    pub finished: Vec<Job>,
}

impl JobList {
    pub fn total(&self) -> usize {
        self.pending.len() + self.running.len() + self.finished.len()
    }
}

/// Result of cancelling a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancelled {
    /// State the job was in before cancellation, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevstate: Option<String>,
}

/// Result of a version or project deletion; nothing beyond the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Removed {}

/// Apply the envelope rules to one response body.
///
/// `status = "ok"` yields the typed payload; `status = "error"` surfaces
/// the service's message verbatim as [`ApiError::Remote`]; a non-success
/// HTTP status without a decodable envelope is [`ApiError::HttpStatus`];
/// everything else malformed is [`ApiError::Protocol`].
pub(crate) fn decode_body<T: DeserializeOwned>(
    url: &Url,
    status: reqwest::StatusCode,
    body: &[u8],
) -> Result<T, ApiError> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Err(err) => {
            return Err(ApiError::Protocol {
                url: url.to_string(),
                detail: format!("invalid JSON: {err}"),
            });
        }
    };

    let envelope = value
        .get("status")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    match envelope.as_deref() {
        Some("ok") => serde_json::from_value(value).map_err(|err| ApiError::Protocol {
            url: url.to_string(),
            detail: format!("unexpected payload: {err}"),
        }),
        Some("error") => {
            let message = value
                .get("message")
                .map(render_message)
                .unwrap_or_else(|| "remote service reported an error".to_string());
            Err(ApiError::Remote { message })
        }
        Some(other) => Err(ApiError::Protocol {
            url: url.to_string(),
            detail: format!("unknown status '{other}'"),
        }),
        None if !status.is_success() => Err(ApiError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        }),
        None => Err(ApiError::Protocol {
            url: url.to_string(),
            detail: "response has no status field".to_string(),
        }),
    }
}

/// Error messages are usually strings, but some services put structured
/// data there; render whatever arrived.
fn render_message(message: &serde_json::Value) -> String {
    match message.as_str() {
        Some(text) => text.to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn url() -> Url {
        Url::parse("http://localhost:6800/schedule.json").unwrap()
    }

    #[test]
    fn ok_envelope_yields_payload() {
        let body = br#"{"status": "ok", "jobid": "abc123", "node_name": "worker-1"}"#;
        let scheduled: Scheduled = decode_body(&url(), StatusCode::OK, body).unwrap();
        assert_eq!(scheduled.jobid, "abc123");
    }

    #[test]
    fn error_envelope_surfaces_message_verbatim() {
        let body = br#"{"status": "error", "message": "spider 'nope' not found"}"#;
        let err = decode_body::<Scheduled>(&url(), StatusCode::OK, body).unwrap_err();
        match err {
            ApiError::Remote { message } => assert_eq!(message, "spider 'nope' not found"),
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn error_envelope_wins_even_on_http_error_status() {
        let body = br#"{"status": "error", "message": "project already deleted"}"#;
        let err = decode_body::<Removed>(&url(), StatusCode::INTERNAL_SERVER_ERROR, body)
            .unwrap_err();
        assert!(matches!(err, ApiError::Remote { .. }));
    }

    #[test]
    fn structured_message_is_rendered() {
        let body = br#"{"status": "error", "message": {"detail": "boom"}}"#;
        let err = decode_body::<Removed>(&url(), StatusCode::OK, body).unwrap_err();
        match err {
            ApiError::Remote { message } => assert!(message.contains("boom")),
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_protocol_error() {
        let body = br#"{"status": "pending"}"#;
        let err = decode_body::<Removed>(&url(), StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, ApiError::Protocol { .. }));
    }

    #[test]
    fn missing_status_on_success_is_protocol_error() {
        let body = br#"{"jobid": "abc123"}"#;
        let err = decode_body::<Scheduled>(&url(), StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, ApiError::Protocol { .. }));
    }

    #[test]
    fn http_error_without_envelope_is_status_error() {
        let err =
            decode_body::<Removed>(&url(), StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>")
                .unwrap_err();
        match err {
            ApiError::HttpStatus { status, .. } => assert_eq!(status, 502),
            other => panic!("expected HttpStatus, got {other:?}"),
        }

        let err = decode_body::<Removed>(&url(), StatusCode::NOT_FOUND, br#"{"detail": "gone"}"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus { status: 404, .. }));
    }

    #[test]
    fn garbage_on_success_is_protocol_error() {
        let err = decode_body::<Removed>(&url(), StatusCode::OK, b"not json").unwrap_err();
        assert!(matches!(err, ApiError::Protocol { .. }));
    }

    #[test]
    fn payload_missing_required_field_is_protocol_error() {
        let body = br#"{"status": "ok"}"#;
        let err = decode_body::<Scheduled>(&url(), StatusCode::OK, body).unwrap_err();
        match err {
            ApiError::Protocol { detail, .. } => assert!(detail.contains("jobid")),
            other => panic!("expected Protocol, got {other:?}"),
        }
    }

    #[test]
    fn listing_payloads_tolerate_missing_buckets() {
        let body = br#"{"status": "ok", "pending": [{"id": "j1", "spider": "news"}]}"#;
        let jobs: JobList = decode_body(&url(), StatusCode::OK, body).unwrap();
        assert_eq!(jobs.pending.len(), 1);
        assert_eq!(jobs.pending[0].spider, "news");
        assert!(jobs.running.is_empty());
        assert_eq!(jobs.total(), 1);
    }
}
