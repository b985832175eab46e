//! Google Calendar v3 REST client. Only creating and listing events
//! is supported.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventDateTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    // Only set for all-day events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn at(timestamp: &str) -> Self {
        Self {
            date_time: Some(timestamp.to_string()),
            ..Default::default()
        }
    }

    /// The precise timestamp, or the date for all-day events.
    pub fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attendee {
    pub email: String,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventBody {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "htmlLink")]
    pub html_link: Option<String>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    pub attendees: Option<Vec<Attendee>>,
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub time_min: String,
    pub time_max: String,
    pub max_results: u32,
}

#[derive(Debug, Error)]
pub enum GcalError {
    #[error("API error: {code} {reason}")]
    Status { code: u16, reason: String },
    #[error("Request to the calendar API timed out")]
    Timeout,
    #[error("Request to the calendar API failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Unexpected response from the calendar API: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GcalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GcalError::Timeout
        } else {
            GcalError::Transport(err)
        }
    }
}

// {"error": {"code": 403, "message": "...", "errors": [...]}}
#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, GcalError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let reason = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .or_else(|| status.canonical_reason().map(String::from))
            .unwrap_or_default();
        return Err(GcalError::Status {
            code: status.as_u16(),
            reason,
        });
    }

    serde_json::from_str(&body).map_err(|e| GcalError::Decode(e.to_string()))
}

pub struct CalendarClient {
    http: Client,
    base_url: String,
}

impl CalendarClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &EventBody,
    ) -> Result<Event, GcalError> {
        let resp = self
            .http
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await?;
        decode(resp).await
    }

    /// List single occurrences of events between the bounds ordered
    /// by start time.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &ListQuery,
    ) -> Result<Vec<Event>, GcalError> {
        let max_results = query.max_results.to_string();
        let resp = self
            .http
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", query.time_min.as_str()),
                ("timeMax", query.time_max.as_str()),
                ("maxResults", max_results.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;
        let list: EventList = decode(resp).await?;
        Ok(list.items)
    }
}
