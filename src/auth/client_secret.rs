// Service principal (client secret) token acquisition

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

use super::credentials::TokenCredential;
use super::types::{AccessToken, TokenResponse};
use crate::error::CredentialError;

/// Public-cloud Entra ID authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Client credentials grant against the Entra ID v2.0 token endpoint
pub struct ClientSecretCredential {
    client: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        client: Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "ClientSecretCredential"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let url = self.token_url();
        let scope = scopes.join(" ");

        tracing::debug!(
            "Client credentials request: url={}, client_id={}..., scope={}",
            url,
            &self.client_id[..8.min(self.client_id.len())],
            scope
        );

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self.client.post(&url).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!("Client credentials request failed: status={}", status);
            return Err(CredentialError::Authentication {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
        data.into_access_token(Utc::now())
    }
}

/// [`ClientSecretCredential`] configured from `AZURE_TENANT_ID`,
/// `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET` and `AZURE_AUTHORITY_HOST`
pub struct EnvironmentCredential {
    inner: Option<ClientSecretCredential>,
}

impl EnvironmentCredential {
    pub fn from_env(client: Client) -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let inner = match (
            var("AZURE_TENANT_ID"),
            var("AZURE_CLIENT_ID"),
            var("AZURE_CLIENT_SECRET"),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                let authority_host =
                    var("AZURE_AUTHORITY_HOST").unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
                Some(ClientSecretCredential::new(
                    client,
                    authority_host,
                    tenant_id,
                    client_id,
                    client_secret,
                ))
            }
            _ => None,
        };

        Self { inner }
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "EnvironmentCredential"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        match &self.inner {
            Some(credential) => credential.get_token(scopes).await,
            None => Err(CredentialError::Unavailable(
                "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET are not all set"
                    .to_string(),
            )),
        }
    }
}
