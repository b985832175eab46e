//! Lifecycle of the single stored Google OAuth credential.
//!
//! ```text
//! NoCredential --consent--> Valid --time--> Expired --refresh ok--> Valid
//!                                              |
//!                                              +--refresh failed--> NoCredential
//! ```
//!
//! A refresh failure deletes the store so the next attempt starts a
//! clean sign in instead of retrying a broken token forever. Calendar
//! calls go through `acquire_credential` which never opens a browser;
//! the interactive flow only runs from `bootstrap_credential`.
//!
//! The store is a single JSON file and is not safe for concurrent
//! writers across processes beyond the atomic rename on save.

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::oauth::ClientSecrets;
use crate::core::AppConfig;

pub const CREDENTIAL_VERSION: u32 = 1;

// Treat tokens this close to expiry as already expired so they don't
// lapse mid-request
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub version: u32,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("version", &self.version)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .field("scopes", &self.scopes)
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True when every scope in `required` was granted.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|s| self.scopes.contains(s))
    }
}

/// File backed storage for a single `Credential`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential. Anything unreadable is the same as
    /// no credential at all.
    pub fn load(&self) -> Option<Credential> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No stored credential at {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    "Unable to read credential from {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<Credential>(&contents) {
            Ok(credential) if credential.version == CREDENTIAL_VERSION => Some(credential),
            Ok(credential) => {
                tracing::warn!(
                    "Ignoring credential in {} with unsupported version {}",
                    self.path.display(),
                    credential.version
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Unable to load credential from {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Write the credential to a temp file next to the store and
    /// rename it into place.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(credential)?;
        let tmp_path = self.path.with_extension("tmp");

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&tmp_path)
            .with_context(|| format!("Failed to open {}", tmp_path.display()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move credential into {}", self.path.display()))?;
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete {}", self.path.display()))
            }
        }
    }
}

/// The OAuth identity provider that issues credentials.
#[async_trait]
pub trait IdentityProvider {
    /// Exchange the refresh token for a new access token.
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;
    /// Run the interactive consent flow for `scopes`.
    async fn consent(&self, secrets: &ClientSecrets, scopes: &[String]) -> Result<Credential>;
}

pub type BoxedIdentityProvider = Box<dyn IdentityProvider + Send + Sync + 'static>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("OAuth client secrets file is missing")]
    MissingClientSecrets,
    #[error("No valid credential is available")]
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Consent {
    Allowed,
    Forbidden,
}

pub struct CredentialManager {
    store: CredentialStore,
    client_secrets_path: PathBuf,
    scopes: Vec<String>,
    provider: BoxedIdentityProvider,
}

impl CredentialManager {
    pub fn new(config: &AppConfig, provider: BoxedIdentityProvider) -> Self {
        Self {
            store: CredentialStore::new(&config.credentials_path),
            client_secrets_path: config.client_secrets_path.clone(),
            scopes: config.scopes.clone(),
            provider,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Get a valid credential without user interaction, refreshing
    /// and persisting it if needed.
    pub async fn acquire_credential(&self) -> Result<Credential, AuthError> {
        self.acquire(Consent::Forbidden).await
    }

    /// Same as `acquire_credential` but falls back to the interactive
    /// browser consent flow when there is nothing usable to refresh.
    pub async fn bootstrap_credential(&self) -> Result<Credential, AuthError> {
        self.acquire(Consent::Allowed).await
    }

    async fn acquire(&self, consent: Consent) -> Result<Credential, AuthError> {
        let now = Utc::now();

        let stored = self.store.load().filter(|c| {
            let granted = c.has_scopes(&self.scopes);
            if !granted {
                tracing::warn!(
                    "Stored credential is missing scopes {:?}, re-authentication required",
                    self.scopes
                );
            }
            granted
        });

        let refreshed = match stored {
            Some(credential) if credential.is_valid_at(now) => return Ok(credential),
            Some(credential) if credential.is_expired_at(now) && credential.can_refresh() => {
                self.refresh(&credential).await
            }
            _ => None,
        };

        let credential = match refreshed {
            Some(credential) => credential,
            None => self.consent(consent).await?,
        };

        if !credential.is_valid() {
            tracing::warn!("Unable to obtain a valid credential");
            return Err(AuthError::Unavailable);
        }

        if let Err(e) = self.store.save(&credential) {
            tracing::error!("Failed to save credential: {:#}", e);
        } else {
            tracing::info!("Saved credential to {}", self.store.path().display());
        }

        Ok(credential)
    }

    async fn refresh(&self, stale: &Credential) -> Option<Credential> {
        tracing::info!("Refreshing expired access token");
        let result = self
            .provider
            .refresh(stale)
            .await
            .and_then(|fresh| {
                if fresh.is_valid() {
                    Ok(fresh)
                } else {
                    Err(anyhow::anyhow!("Refreshed credential is already expired"))
                }
            });

        match result {
            Ok(fresh) => {
                tracing::info!("Access token refreshed");
                Some(fresh)
            }
            Err(e) => {
                tracing::error!(
                    "Failed to refresh access token, re-authentication required: {:#}",
                    e
                );
                if let Err(e) = self.store.delete() {
                    tracing::error!("{:#}", e);
                }
                None
            }
        }
    }

    async fn consent(&self, consent: Consent) -> Result<Credential, AuthError> {
        if !self.client_secrets_path.exists() {
            tracing::error!(
                "Missing OAuth client secrets file '{}', download it from the Google Cloud console",
                self.client_secrets_path.display()
            );
            return Err(AuthError::MissingClientSecrets);
        }

        if consent == Consent::Forbidden {
            tracing::warn!("No valid credential, run `concierge auth` to sign in");
            return Err(AuthError::Unavailable);
        }

        let secrets = ClientSecrets::from_file(&self.client_secrets_path).map_err(|e| {
            tracing::error!("{:#}", e);
            AuthError::Unavailable
        })?;

        tracing::info!("Starting OAuth consent flow");
        self.provider
            .consent(&secrets, &self.scopes)
            .await
            .map_err(|e| {
                tracing::error!("OAuth consent flow failed: {:#}", e);
                AuthError::Unavailable
            })
    }
}
