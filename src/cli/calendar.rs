use anyhow::Result;
use serde_json::Value;

use crate::calendar::CalendarService;
use crate::calendar::public::{CreateEventRequest, ListEventsRequest, resolve_max_results};
use crate::core::AppConfig;

pub async fn create(config: &AppConfig, req: CreateEventRequest) -> Result<()> {
    let service = CalendarService::new(config)?;
    println!("{}", service.create_event(req).await.to_json());
    Ok(())
}

pub async fn list(
    config: &AppConfig,
    time_min: String,
    time_max: String,
    max_results: &str,
) -> Result<()> {
    let service = CalendarService::new(config)?;
    // Coerced like a tool argument so "abc" or "-5" fall back to the default
    let max_results = serde_json::from_str(max_results.trim()).unwrap_or(Value::Null);
    let req = ListEventsRequest {
        time_min,
        time_max,
        max_results: resolve_max_results(&max_results),
    };
    println!("{}", service.list_events(req).await.to_json());
    Ok(())
}

pub fn now(config: &AppConfig) -> Result<()> {
    let service = CalendarService::new(config)?;
    println!("{}", service.current_datetime().to_json());
    Ok(())
}
