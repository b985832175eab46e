//! Test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use tempfile::TempDir;

use concierge::core::AppConfig;
use concierge::google::{Credential, CredentialStore};

pub const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Configuration with every path inside `dir` and the calendar API
/// pointed at `calendar_api_url`, usually a mockito server.
pub fn test_config(dir: &TempDir, calendar_api_url: &str) -> AppConfig {
    AppConfig {
        credentials_path: dir.path().join("credentials.json"),
        client_secrets_path: dir.path().join("client_secrets.json"),
        scopes: vec![SCOPE.to_string()],
        default_utc_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
        calendar_api_url: calendar_api_url.to_string(),
        calendar_id: "primary".to_string(),
        oauth_auth_url: format!("{}/auth", calendar_api_url),
        oauth_token_url: format!("{}/token", calendar_api_url),
        http_timeout: Duration::from_secs(5),
        consent_timeout: Duration::from_secs(5),
        model: "test-model".to_string(),
        log_level: "debug".to_string(),
    }
}

/// A credential valid for another hour.
pub fn valid_credential(token_uri: &str) -> Credential {
    Credential {
        version: 1,
        access_token: "access-token".to_string(),
        refresh_token: Some("refresh-token".to_string()),
        expiry: Some(Utc::now() + chrono::Duration::hours(1)),
        scopes: vec![SCOPE.to_string()],
        token_uri: token_uri.to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
    }
}

/// A credential that expired an hour ago but can still be refreshed.
pub fn expired_credential(token_uri: &str) -> Credential {
    Credential {
        access_token: "stale-token".to_string(),
        expiry: Some(Utc::now() - chrono::Duration::hours(1)),
        ..valid_credential(token_uri)
    }
}

pub fn store_credential(config: &AppConfig, credential: &Credential) {
    CredentialStore::new(&config.credentials_path)
        .save(credential)
        .expect("Failed to save credential");
}

pub fn write_client_secrets(config: &AppConfig) {
    fs::write(
        &config.client_secrets_path,
        r#"{"installed": {"client_id": "client-id", "client_secret": "client-secret"}}"#,
    )
    .expect("Failed to write client secrets");
}

/// Base URL of a server that accepts connections and never answers.
pub async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut open = vec![];
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });
    url
}
