use std::sync::Arc;

use anyhow::Result;

use crate::ai::agents::CalendarAgent;
use crate::calendar::CalendarService;
use crate::core::AppConfig;

fn agent(config: &AppConfig) -> Result<CalendarAgent> {
    let service = Arc::new(CalendarService::new(config)?);
    Ok(CalendarAgent::new(config, service))
}

pub fn describe(config: &AppConfig) -> Result<()> {
    let agent = agent(config)?;
    println!("{}", serde_json::to_string_pretty(&agent)?);
    Ok(())
}

pub async fn call(config: &AppConfig, name: &str, args: &str) -> Result<()> {
    let agent = agent(config)?;
    println!("{}", agent.call_tool(name, args).await);
    Ok(())
}
