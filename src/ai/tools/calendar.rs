use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::function::{Function, Parameters, Property, ToolCall, ToolType};
use crate::calendar::CalendarService;
use crate::calendar::public::{
    CreateEventRequest, ListEventsRequest, ToolError, ToolResult, resolve_attendees,
    resolve_max_results,
};

fn bad_args(tool: &str, err: serde_json::Error) -> String {
    tracing::warn!("Invalid arguments for {}: {}", tool, err);
    ToolResult::<()>::Error(ToolError::invalid_arguments(&format!(
        "Invalid arguments: {}",
        err
    )))
    .to_json()
}

#[derive(Serialize)]
pub struct CreateEventProps {
    pub summary: Property,
    pub start_time: Property,
    pub end_time: Property,
    pub description: Property,
    pub location: Property,
    pub attendees: Property,
}

#[derive(Deserialize)]
pub struct CreateEventArgs {
    pub summary: String,
    pub start_time: String,
    pub end_time: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Value,
}

impl From<CreateEventArgs> for CreateEventRequest {
    fn from(args: CreateEventArgs) -> Self {
        Self {
            attendees: resolve_attendees(&args.attendees),
            summary: args.summary,
            start_time: args.start_time,
            end_time: args.end_time,
            description: args.description.unwrap_or_default(),
            location: args.location.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
pub struct CreateEventTool {
    pub r#type: ToolType,
    pub function: Function<CreateEventProps>,
    #[serde(skip)]
    service: Arc<CalendarService>,
}

#[async_trait]
impl ToolCall for CreateEventTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: CreateEventArgs = match serde_json::from_str(args) {
            Ok(fn_args) => fn_args,
            Err(e) => return Ok(bad_args(&self.function.name, e)),
        };
        Ok(self.service.create_event(fn_args.into()).await.to_json())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl CreateEventTool {
    pub fn new(service: Arc<CalendarService>) -> Self {
        let function = Function {
            name: String::from("create_calendar_event"),
            description: String::from(
                "Create an event on the user's primary Google Calendar.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: CreateEventProps {
                    summary: Property::string("Title of the event."),
                    start_time: Property::string(
                        "Start of the event, preferably ISO 8601 like 2025-01-01T12:00:00-05:00.",
                    ),
                    end_time: Property::string(
                        "End of the event, preferably ISO 8601 like 2025-01-01T13:00:00-05:00.",
                    ),
                    description: Property::string("Longer description of the event."),
                    location: Property::string("Where the event takes place."),
                    attendees: Property::strings("Email addresses of people to invite."),
                },
                required: vec![
                    String::from("summary"),
                    String::from("start_time"),
                    String::from("end_time"),
                ],
                additional_properties: false,
            },
            strict: false,
        };

        Self {
            r#type: ToolType::Function,
            function,
            service,
        }
    }
}

#[derive(Serialize)]
pub struct ListEventsProps {
    pub time_min: Property,
    pub time_max: Property,
    pub max_results: Property,
}

#[derive(Deserialize)]
pub struct ListEventsArgs {
    pub time_min: String,
    pub time_max: String,
    #[serde(default)]
    pub max_results: Value,
}

impl From<ListEventsArgs> for ListEventsRequest {
    fn from(args: ListEventsArgs) -> Self {
        Self {
            max_results: resolve_max_results(&args.max_results),
            time_min: args.time_min,
            time_max: args.time_max,
        }
    }
}

#[derive(Serialize)]
pub struct ListEventsTool {
    pub r#type: ToolType,
    pub function: Function<ListEventsProps>,
    #[serde(skip)]
    service: Arc<CalendarService>,
}

#[async_trait]
impl ToolCall for ListEventsTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: ListEventsArgs = match serde_json::from_str(args) {
            Ok(fn_args) => fn_args,
            Err(e) => return Ok(bad_args(&self.function.name, e)),
        };
        Ok(self.service.list_events(fn_args.into()).await.to_json())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl ListEventsTool {
    pub fn new(service: Arc<CalendarService>) -> Self {
        let function = Function {
            name: String::from("list_calendar_events"),
            description: String::from(
                "List events on the user's primary Google Calendar between two times, ordered by start time.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: ListEventsProps {
                    time_min: Property::string("Only events ending after this time (ISO 8601)."),
                    time_max: Property::string(
                        "Only events starting before this time (ISO 8601).",
                    ),
                    max_results: Property::integer(
                        "Maximum number of events to return (default is 10).",
                    ),
                },
                required: vec![String::from("time_min"), String::from("time_max")],
                additional_properties: false,
            },
            strict: false,
        };

        Self {
            r#type: ToolType::Function,
            function,
            service,
        }
    }
}
