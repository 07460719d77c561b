use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::azure_cli::AzureCliCredential;
use super::client_secret::EnvironmentCredential;
use super::managed_identity::ManagedIdentityCredential;
use super::types::AccessToken;
use crate::error::CredentialError;

/// Timeout for every token endpoint request
const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Source of Azure AD access tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and chain diagnostics
    fn name(&self) -> &'static str;

    /// Request a token valid for the given scopes
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError>;
}

/// Chained credential: environment service principal, then managed identity,
/// then the Azure CLI login.
///
/// Sources reporting [`CredentialError::Unavailable`] are skipped; any other
/// error ends the attempt. Once a source succeeds it is used exclusively.
pub struct DefaultAzureCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
    selected: RwLock<Option<usize>>,
}

impl DefaultAzureCredential {
    /// Build the chain from the process environment
    pub fn new() -> Result<Self, CredentialError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
            .build()?;

        let sources: Vec<Arc<dyn TokenCredential>> = vec![
            Arc::new(EnvironmentCredential::from_env(client.clone())),
            Arc::new(ManagedIdentityCredential::from_env(client)),
            Arc::new(AzureCliCredential::new()),
        ];
        Ok(Self::with_sources(sources))
    }

    /// Build a chain over explicit sources, tried in order
    pub fn with_sources(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            selected: RwLock::new(None),
        }
    }
}

#[async_trait]
impl TokenCredential for DefaultAzureCredential {
    fn name(&self) -> &'static str {
        "DefaultAzureCredential"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let selected = *self.selected.read().await;
        if let Some(index) = selected {
            return self.sources[index].get_token(scopes).await;
        }

        let mut reasons = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            match source.get_token(scopes).await {
                Ok(token) => {
                    tracing::info!("Acquired access token via {}", source.name());
                    *self.selected.write().await = Some(index);
                    return Ok(token);
                }
                Err(CredentialError::Unavailable(reason)) => {
                    tracing::debug!("{} unavailable: {}", source.name(), reason);
                    reasons.push(format!("{}: {}", source.name(), reason));
                }
                Err(e) => return Err(e),
            }
        }

        Err(CredentialError::Unavailable(format!(
            "no credential source succeeded ({})",
            reasons.join("; ")
        )))
    }
}
