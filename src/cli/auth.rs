use anyhow::{Result, anyhow};

use crate::core::AppConfig;
use crate::google::{AuthError, CredentialManager, GoogleIdentity};

/// Run the interactive consent flow if there is no usable credential
/// and save the result.
pub async fn run(config: &AppConfig) -> Result<()> {
    let identity = GoogleIdentity::new(config)?;
    let manager = CredentialManager::new(config, Box::new(identity));

    match manager.bootstrap_credential().await {
        Ok(credential) => {
            println!(
                "Signed in with scopes {}. Credential saved to {}",
                credential.scopes.join(" "),
                manager.store().path().display()
            );
            Ok(())
        }
        Err(AuthError::MissingClientSecrets) => Err(anyhow!(
            "Missing OAuth client secrets at {}. Download an OAuth client (desktop app) from the Google Cloud console and save it there.",
            config.client_secrets_path.display()
        )),
        Err(e) => Err(anyhow!("Authentication failed: {}", e)),
    }
}
