use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::ai::function::{Function, Parameters, ToolCall, ToolType};
use crate::calendar::CalendarService;

#[derive(Serialize)]
pub struct CurrentDateTimeProps {}

#[derive(Serialize)]
pub struct CurrentDateTimeTool {
    pub r#type: ToolType,
    pub function: Function<CurrentDateTimeProps>,
    #[serde(skip)]
    service: Arc<CalendarService>,
}

#[async_trait]
impl ToolCall for CurrentDateTimeTool {
    async fn call(&self, _args: &str) -> Result<String, Error> {
        Ok(self.service.current_datetime().to_json())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl CurrentDateTimeTool {
    pub fn new(service: Arc<CalendarService>) -> Self {
        let function = Function {
            name: String::from("get_current_datetime"),
            description: String::from(
                "Get the current date and time. Use it to resolve relative dates like 'tomorrow'.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: CurrentDateTimeProps {},
                required: vec![],
                additional_properties: false,
            },
            strict: true,
        };

        Self {
            r#type: ToolType::Function,
            function,
            service,
        }
    }
}
