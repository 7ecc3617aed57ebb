//! Structured view of the JSON error bodies CouchDB returns on failure
//!
//! A failed request usually answers with `{"error":"not_found","reason":"missing"}`,
//! but proxies and misconfigured servers can hand back HTML or plain text.
//! Parsing is therefore total: every input yields a `CouchErrorContent`.

use serde_json::Value;
use std::fmt;

/// CouchErrorContent represents the `error`/`reason` pair of a failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchErrorContent {
    pub error: Option<String>,
    pub reason: Option<String>,
    no_error: bool,
}

impl CouchErrorContent {
    /// The shared value meaning "no error occurred"
    pub const NO_ERROR: CouchErrorContent = CouchErrorContent {
        error: None,
        reason: None,
        no_error: true,
    };

    pub fn new(error: Option<String>, reason: Option<String>) -> Self {
        Self {
            error,
            reason,
            no_error: false,
        }
    }

    /// Parse a raw error body. Never fails.
    ///
    /// - `None` or `""` gives [`CouchErrorContent::NO_ERROR`]
    /// - a JSON object gives its `error` and `reason` members, each optional
    /// - anything else is echoed verbatim as both `error` and `reason`
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Self::NO_ERROR,
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::new(
                map.get("error").and_then(field_text),
                map.get("reason").and_then(field_text),
            ),
            Ok(_) | Err(_) => {
                tracing::debug!("Error body is not a JSON object, echoing raw text");
                Self::new(Some(raw.to_string()), Some(raw.to_string()))
            }
        }
    }

    pub fn is_no_error(&self) -> bool {
        self.no_error
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// True when the server reported `not_found` (missing or deleted document)
    pub fn is_not_found(&self) -> bool {
        self.error() == Some("not_found")
    }

    /// True when the server rejected a write because of a stale revision
    pub fn is_conflict(&self) -> bool {
        self.error() == Some("conflict")
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl fmt::Display for CouchErrorContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.no_error {
            return f.write_str("no error");
        }
        match (self.error(), self.reason()) {
            (Some(error), Some(reason)) if error == reason => f.write_str(error),
            (Some(error), Some(reason)) => write!(f, "{}: {}", error, reason),
            (Some(error), None) => f.write_str(error),
            (None, Some(reason)) => f.write_str(reason),
            (None, None) => f.write_str("unknown error"),
        }
    }
}
