//! Google OAuth 2.0 for installed apps.
//!
//! Consent uses the loopback redirect flow: listen on a random local
//! port, send the user to Google's consent page, wait for the single
//! redirect carrying the authorization code and trade it for tokens.
//! PKCE is used on top of the client secret.

use std::collections::HashMap;
use std::fmt;
use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

use super::credentials::{CREDENTIAL_VERSION, Credential, IdentityProvider};
use crate::core::AppConfig;

/// OAuth client identifiers as downloaded from the Google Cloud
/// console.
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: Option<String>,
    pub token_uri: Option<String>,
}

impl fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

// The file nests the secrets under the application type
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client secrets {}", path.display()))?;
        let file: ClientSecretsFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse client secrets {}", path.display()))?;
        file.installed.or(file.web).ok_or(anyhow!(
            "Client secrets {} has neither an 'installed' nor a 'web' section",
            path.display()
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

#[derive(Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl OAuthToken {
    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| now + chrono::Duration::seconds(secs))
    }

    fn granted_scopes(&self) -> Option<Vec<String>> {
        self.scope
            .as_ref()
            .map(|s| s.split_whitespace().map(String::from).collect())
    }

    /// Build a new credential from the tokens issued by the consent
    /// flow.
    pub fn into_credential(
        self,
        secrets: &ClientSecrets,
        token_uri: &str,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Credential {
        let expiry = self.expiry(now);
        let scopes = self
            .granted_scopes()
            .unwrap_or_else(|| requested_scopes.to_vec());
        Credential {
            version: CREDENTIAL_VERSION,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry,
            scopes,
            token_uri: token_uri.to_string(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
        }
    }

    /// Apply a refresh response to an existing credential. Google
    /// usually leaves out the refresh token so the old one is kept.
    pub fn refresh_credential(self, stale: &Credential, now: DateTime<Utc>) -> Credential {
        let expiry = self.expiry(now);
        let scopes = self.granted_scopes().unwrap_or_else(|| stale.scopes.clone());
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or_else(|| stale.refresh_token.clone()),
            expiry,
            scopes,
            ..stale.clone()
        }
    }
}

async fn token_request(http: &Client, token_uri: &str, form: &[(&str, &str)]) -> Result<OAuthToken> {
    let resp = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .with_context(|| format!("Token request to {} failed", token_uri))?;

    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        let detail = match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{}: {}", err.error, desc),
                None => err.error,
            },
            Err(_) => body,
        };
        bail!("Token endpoint returned {}: {}", status, detail);
    }

    serde_json::from_str(&body).with_context(|| "Failed to parse token response")
}

pub async fn exchange_code_for_token(
    http: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> Result<OAuthToken> {
    token_request(
        http,
        token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ],
    )
    .await
}

pub async fn refresh_access_token(
    http: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthToken> {
    token_request(
        http,
        token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ],
    )
    .await
}

pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        // 64 hex chars, inside the 43..=128 length RFC 7636 allows
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn authorization_url(
    auth_uri: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
    code_challenge: &str,
) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}&code_challenge={}&code_challenge_method=S256",
        auth_uri,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes.join(" ")),
        urlencoding::encode(state),
        urlencoding::encode(code_challenge),
    )
}

const DONE_PAGE: &str = "<html><body>The authentication flow has completed. You may close this window.</body></html>";

// Time allowed for the confirmation page to reach the browser
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

type RedirectParams = HashMap<String, String>;

#[derive(Clone)]
struct CallbackState {
    redirect: Arc<Mutex<Option<oneshot::Sender<RedirectParams>>>>,
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, Html<&'static str>) {
    if !params.contains_key("code") && !params.contains_key("error") {
        return (StatusCode::NOT_FOUND, Html(""));
    }
    if let Some(tx) = state.redirect.lock().await.take() {
        let _ = tx.send(params);
    }
    (StatusCode::OK, Html(DONE_PAGE))
}

/// Serve the OAuth redirect on `listener` until it arrives and return
/// the authorization code from it. Other requests, including idle or
/// malformed connections, don't interrupt the wait.
pub async fn wait_for_code(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (redirect_tx, redirect_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let app = Router::new()
        .route("/", get(callback))
        .with_state(CallbackState {
            redirect: Arc::new(Mutex::new(Some(redirect_tx))),
        });

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    let params = tokio::select! {
        res = &mut server => {
            res.with_context(|| "Redirect listener failed")?;
            bail!("Redirect listener stopped before the redirect arrived");
        }
        params = redirect_rx => params.with_context(|| "Redirect listener dropped the redirect")?,
    };

    let _ = stop_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
        tracing::debug!("Redirect listener still had open connections at shutdown");
    }

    if let Some(error) = params.get("error") {
        bail!("Authorization was denied: {}", error);
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        bail!("OAuth state mismatch in redirect");
    }
    params
        .get("code")
        .cloned()
        .ok_or(anyhow!("Redirect did not include an authorization code"))
}

/// Identity provider backed by Google's OAuth endpoints.
pub struct GoogleIdentity {
    http: Client,
    auth_url: String,
    token_url: String,
    consent_timeout: Duration,
}

impl GoogleIdentity {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .with_context(|| "Failed to build HTTP client")?;
        Ok(Self {
            http,
            auth_url: config.oauth_auth_url.clone(),
            token_url: config.oauth_token_url.clone(),
            consent_timeout: config.consent_timeout,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(anyhow!("No refresh token in credential"))?;
        let token = refresh_access_token(
            &self.http,
            &credential.token_uri,
            &credential.client_id,
            &credential.client_secret,
            refresh_token,
        )
        .await?;
        Ok(token.refresh_credential(credential, Utc::now()))
    }

    async fn consent(&self, secrets: &ClientSecrets, scopes: &[String]) -> Result<Credential> {
        let auth_uri = secrets.auth_uri.as_deref().unwrap_or(&self.auth_url);
        let token_uri = secrets.token_uri.as_deref().unwrap_or(&self.token_url);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = Uuid::new_v4().simple().to_string();
        let pkce = Pkce::generate();

        let url = authorization_url(
            auth_uri,
            &secrets.client_id,
            &redirect_uri,
            scopes,
            &state,
            &pkce.challenge,
        );
        println!(
            "\nPlease open the following URL in your browser and authorize access:\n\n{}\n",
            url
        );

        let code = tokio::time::timeout(self.consent_timeout, wait_for_code(listener, &state))
            .await
            .map_err(|_| anyhow!("Timed out waiting for the OAuth redirect"))??;

        let token = exchange_code_for_token(
            &self.http,
            token_uri,
            &secrets.client_id,
            &secrets.client_secret,
            &code,
            &redirect_uri,
            &pkce.verifier,
        )
        .await?;

        Ok(token.into_credential(secrets, token_uri, scopes, Utc::now()))
    }
}
