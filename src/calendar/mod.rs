pub mod datetime;
pub mod public;

use anyhow::Result;
use chrono::{FixedOffset, SecondsFormat, Utc};

use crate::core::AppConfig;
use crate::google::credentials::BoxedIdentityProvider;
use crate::google::gcal::{Attendee, Event, EventBody, EventDateTime, ListQuery};
use crate::google::{CalendarClient, CredentialManager, GoogleIdentity};
use public::{
    CreateEventRequest, CreatedEvent, CurrentDateTime, EventList, EventSummary,
    ListEventsRequest, ToolError, ToolResult,
};

/// Calendar operations on the configured calendar. Each operation
/// acquires a credential, validates its input and makes at most one
/// call to the calendar API.
pub struct CalendarService {
    credentials: CredentialManager,
    client: CalendarClient,
    calendar_id: String,
    default_offset: FixedOffset,
}

impl CalendarService {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let identity = GoogleIdentity::new(config)?;
        Self::with_provider(config, Box::new(identity))
    }

    pub fn with_provider(config: &AppConfig, provider: BoxedIdentityProvider) -> Result<Self> {
        Ok(Self {
            credentials: CredentialManager::new(config, provider),
            client: CalendarClient::new(&config.calendar_api_url, config.http_timeout)?,
            calendar_id: config.calendar_id.clone(),
            default_offset: config.default_utc_offset,
        })
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn default_offset(&self) -> FixedOffset {
        self.default_offset
    }

    pub async fn create_event(&self, req: CreateEventRequest) -> ToolResult<CreatedEvent> {
        let credential = match self.credentials.acquire_credential().await {
            Ok(credential) => credential,
            Err(e) => return ToolError::from(e).into(),
        };

        let (start, end) = match self.normalize_range(
            ("start_time", &req.start_time),
            ("end_time", &req.end_time),
        ) {
            Ok(range) => range,
            Err(e) => return e.into(),
        };

        let body = EventBody {
            summary: req.summary,
            description: req.description,
            location: req.location,
            start: EventDateTime::at(&start),
            end: EventDateTime::at(&end),
            attendees: req
                .attendees
                .into_iter()
                .map(|email| Attendee {
                    email,
                    display_name: None,
                })
                .collect(),
        };

        tracing::debug!("Creating event '{}' from {} to {}", body.summary, start, end);
        match self
            .client
            .insert_event(&credential.access_token, &self.calendar_id, &body)
            .await
        {
            Ok(event) => {
                tracing::info!("Created event {:?}", event.id);
                ToolResult::Success(CreatedEvent {
                    event_id: event.id.unwrap_or_default(),
                    html_link: event.html_link,
                })
            }
            Err(e) => {
                tracing::error!("Failed to create event: {}", e);
                ToolError::from(e).into()
            }
        }
    }

    pub async fn list_events(&self, req: ListEventsRequest) -> ToolResult<EventList> {
        let credential = match self.credentials.acquire_credential().await {
            Ok(credential) => credential,
            Err(e) => return ToolError::from(e).into(),
        };

        let (time_min, time_max) = match self
            .normalize_range(("time_min", &req.time_min), ("time_max", &req.time_max))
        {
            Ok(range) => range,
            Err(e) => return e.into(),
        };

        let query = ListQuery {
            time_min,
            time_max,
            max_results: req.max_results.max(1),
        };
        tracing::debug!("Listing events {:?}", query);
        match self
            .client
            .list_events(&credential.access_token, &self.calendar_id, &query)
            .await
        {
            Ok(events) => ToolResult::Success(EventList {
                events: events.into_iter().map(summarize).collect(),
            }),
            Err(e) => {
                tracing::error!("Failed to list events: {}", e);
                ToolError::from(e).into()
            }
        }
    }

    pub fn current_datetime(&self) -> ToolResult<CurrentDateTime> {
        let now = Utc::now().with_timezone(&self.default_offset);
        ToolResult::Success(CurrentDateTime {
            current_datetime_iso: now.to_rfc3339_opts(SecondsFormat::Secs, false),
        })
    }

    // Every field that fails to parse is reported, not just the first
    fn normalize_range(
        &self,
        (first_name, first): (&str, &str),
        (second_name, second): (&str, &str),
    ) -> Result<(String, String), ToolError> {
        let first = datetime::normalize(first, self.default_offset);
        let second = datetime::normalize(second, self.default_offset);
        match (first, second) {
            (Some(first), Some(second)) => Ok((first, second)),
            (first, second) => {
                let mut fields = vec![];
                if first.is_none() {
                    fields.push(first_name);
                }
                if second.is_none() {
                    fields.push(second_name);
                }
                Err(ToolError::invalid_date_time(&fields))
            }
        }
    }
}

fn summarize(event: Event) -> EventSummary {
    EventSummary {
        start: event.start.value().map(String::from),
        end: event.end.value().map(String::from),
        summary: event.summary.unwrap_or_default(),
        description: event.description.unwrap_or_default(),
        location: event.location.unwrap_or_default(),
    }
}
