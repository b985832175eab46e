//! Public types for calendar operations. Every operation returns a
//! `ToolResult` which serializes to the `{"status": "success" | "error",
//! ...}` shape the agent runtime expects.

use serde::Serialize;
use serde_json::Value;

use crate::google::{AuthError, GcalError};

pub const DEFAULT_MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthRequired,
    MissingClientSecrets,
    InvalidDateTimeFormat,
    RemoteApiError,
    UnexpectedServerError,
    Timeout,
    InvalidArguments,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
            status_code: None,
            fields: vec![],
        }
    }

    pub fn invalid_date_time(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::new(
                ErrorKind::InvalidDateTimeFormat,
                &format!(
                    "Invalid date/time format for {}. Use ISO 8601.",
                    fields.join(", ")
                ),
            )
        }
    }

    pub fn invalid_arguments(message: &str) -> Self {
        Self::new(ErrorKind::InvalidArguments, message)
    }

    pub fn unexpected() -> Self {
        Self::new(ErrorKind::UnexpectedServerError, "Unexpected server error.")
    }
}

impl From<AuthError> for ToolError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingClientSecrets => Self::new(
                ErrorKind::MissingClientSecrets,
                "Authentication required. The OAuth client secrets file is missing.",
            ),
            AuthError::Unavailable => Self::new(ErrorKind::AuthRequired, "Authentication required."),
        }
    }
}

impl From<GcalError> for ToolError {
    fn from(err: GcalError) -> Self {
        match err {
            GcalError::Status { code, .. } => Self {
                status_code: Some(code),
                ..Self::new(ErrorKind::RemoteApiError, &err.to_string())
            },
            GcalError::Timeout => Self::new(
                ErrorKind::Timeout,
                "The calendar service did not respond in time.",
            ),
            // Details are logged, never shown to the user
            GcalError::Transport(_) | GcalError::Decode(_) => Self::unexpected(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult<T> {
    Success(T),
    Error(ToolError),
}

impl<T: Serialize> ToolResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize tool result: {}", e);
            r#"{"status":"error","kind":"unexpected_server_error","message":"Unexpected server error."}"#
                .to_string()
        })
    }
}

impl<T> From<ToolError> for ToolResult<T> {
    fn from(err: ToolError) -> Self {
        ToolResult::Error(err)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateEventRequest {
    pub summary: String,
    pub start_time: String,
    pub end_time: String,
    pub description: String,
    pub location: String,
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListEventsRequest {
    pub time_min: String,
    pub time_max: String,
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreatedEvent {
    pub event_id: String,
    #[serde(rename = "htmlLink")]
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventSummary {
    pub summary: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub description: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventList {
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentDateTime {
    pub current_datetime_iso: String,
}

/// Anything other than a positive integer falls back to the default.
pub fn resolve_max_results(value: &Value) -> u32 {
    match value.as_i64() {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => DEFAULT_MAX_RESULTS,
    }
}

/// Attendee emails from a JSON list, anything else is no attendees.
pub fn resolve_attendees(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(String::from)
            .collect(),
        _ => vec![],
    }
}
