use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;

use crate::calendar::datetime::parse_offset;

pub const DEFAULT_SCOPES: &str = "https://www.googleapis.com/auth/calendar";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub credentials_path: PathBuf,
    pub client_secrets_path: PathBuf,
    pub scopes: Vec<String>,
    // Applied to any date/time text that doesn't say which zone it is in
    pub default_utc_offset: FixedOffset,
    pub calendar_api_url: String,
    pub calendar_id: String,
    pub oauth_auth_url: String,
    pub oauth_token_url: String,
    pub http_timeout: Duration,
    pub consent_timeout: Duration,
    pub model: String,
    pub log_level: String,
}

impl AppConfig {
    /// Read the configuration from the environment. Call this once at
    /// startup and pass the result around by reference.
    pub fn from_env() -> Result<Self> {
        let credentials_path = env::var("CONCIERGE_CREDENTIALS_PATH")
            .unwrap_or_else(|_| "./credentials.json".to_string());
        let client_secrets_path = env::var("CONCIERGE_CLIENT_SECRETS_PATH")
            .unwrap_or_else(|_| "./client_secrets.json".to_string());
        let scopes = env::var("CONCIERGE_SCOPES").unwrap_or_else(|_| DEFAULT_SCOPES.to_string());
        let default_utc_offset = env::var("CONCIERGE_DEFAULT_UTC_OFFSET")
            .unwrap_or_else(|_| "-05:00".to_string());
        let default_utc_offset = parse_offset(&default_utc_offset)
            .with_context(|| "Invalid CONCIERGE_DEFAULT_UTC_OFFSET")?;
        let calendar_api_url = env::var("CONCIERGE_CALENDAR_API_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string());
        let calendar_id =
            env::var("CONCIERGE_CALENDAR_ID").unwrap_or_else(|_| "primary".to_string());
        let oauth_auth_url = env::var("CONCIERGE_OAUTH_AUTH_URL")
            .unwrap_or_else(|_| "https://accounts.google.com/o/oauth2/auth".to_string());
        let oauth_token_url = env::var("CONCIERGE_OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string());
        let http_timeout = seconds_from_env("CONCIERGE_HTTP_TIMEOUT_SECS", 30)?;
        let consent_timeout = seconds_from_env("CONCIERGE_CONSENT_TIMEOUT_SECS", 300)?;
        let model = env::var("CONCIERGE_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
        let log_level = env::var("CONCIERGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            credentials_path: PathBuf::from(credentials_path),
            client_secrets_path: PathBuf::from(client_secrets_path),
            scopes: scopes.split_whitespace().map(String::from).collect(),
            default_utc_offset,
            calendar_api_url,
            calendar_id,
            oauth_auth_url,
            oauth_token_url,
            http_timeout,
            consent_timeout,
            model,
            log_level,
        })
    }
}

fn seconds_from_env(key: &str, default: u64) -> Result<Duration> {
    let secs = match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Invalid {}: {}", key, val))?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(secs))
}
