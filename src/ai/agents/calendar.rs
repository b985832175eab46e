use std::sync::Arc;

use serde::Serialize;

use crate::ai::function::{BoxedToolCall, dispatch};
use crate::ai::tools::{CreateEventTool, CurrentDateTimeTool, ListEventsTool};
use crate::calendar::CalendarService;
use crate::core::AppConfig;

pub const AGENT_NAME: &str = "calendar_assistant";

/// Agent definition handed to the tool-calling runtime.
#[derive(Serialize)]
pub struct CalendarAgent {
    pub name: String,
    pub description: String,
    pub model: String,
    pub instruction: String,
    pub tools: Vec<BoxedToolCall>,
}

impl CalendarAgent {
    pub fn new(config: &AppConfig, service: Arc<CalendarService>) -> Self {
        let offset = service.default_offset().to_string();
        let tools: Vec<BoxedToolCall> = vec![
            Box::new(CreateEventTool::new(Arc::clone(&service))),
            Box::new(ListEventsTool::new(Arc::clone(&service))),
            Box::new(CurrentDateTimeTool::new(service)),
        ];

        let instruction = format!(
            r#"You are a calendar assistant. Help the user create and look up events on their Google Calendar.

- Call get_current_datetime before working out relative dates such as "tomorrow" or "next friday".
- Pass times as ISO 8601 with an offset, e.g. 2025-01-01T12:00:00{offset}. Assume {offset} when the user does not name a time zone.
- When listing events, pick a time_min and time_max that cover what the user asked about.
- If a tool reports auth_required or missing_client_secrets, tell the user to run `concierge auth`.
- If a tool reports an error, explain it briefly and do not make up event details."#
        );

        Self {
            name: AGENT_NAME.to_string(),
            description: String::from("Creates and lists Google Calendar events."),
            model: config.model.clone(),
            instruction,
            tools,
        }
    }

    pub async fn call_tool(&self, name: &str, args: &str) -> String {
        dispatch(&self.tools, name, args).await
    }
}
