// Token acquisition through the developer's `az login` session

use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::process::Command;

use super::credentials::TokenCredential;
use super::types::{AccessToken, CliTokenResponse};
use crate::error::CredentialError;

pub struct AzureCliCredential {
    program: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self::with_program(program)
    }

    /// Use a specific executable instead of `az` from PATH
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let mut command = Command::new(&self.program);
        command.args(["account", "get-access-token", "--output", "json"]);
        for &scope in scopes {
            command.args(["--scope", scope]);
        }

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CredentialError::Unavailable(
                    "Azure CLI not found on PATH".to_string(),
                ));
            }
            Err(e) => return Err(CredentialError::Cli(e.to_string())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("az login") {
                return Err(CredentialError::Unavailable(
                    "not logged in, run 'az login'".to_string(),
                ));
            }
            return Err(CredentialError::Cli(stderr));
        }

        let data: CliTokenResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
        data.into_access_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_cli_is_unavailable() {
        let credential = AzureCliCredential::with_program("az-definitely-not-installed-here");
        let err = credential
            .get_token(&["https://ossrdbms-aad.database.windows.net/.default"])
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Unavailable(_)));
    }
}
