// Managed identity token acquisition (App Service / IMDS)

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;

use super::credentials::TokenCredential;
use super::types::{scope_to_resource, AccessToken, TokenResponse};
use crate::error::CredentialError;

/// Azure Instance Metadata Service token endpoint
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// IMDS is link-local; a host without it should fail fast so the chain can move on
const IMDS_PROBE_TIMEOUT_SECS: u64 = 2;

/// Where the managed identity token comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedIdentityEndpoint {
    /// App Service / Functions / Container Apps (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`)
    AppService { endpoint: String, header: String },
    /// Virtual machines and AKS node identities
    Imds { endpoint: String },
}

pub struct ManagedIdentityCredential {
    client: Client,
    endpoint: ManagedIdentityEndpoint,
    /// Selects a user-assigned identity; system-assigned when absent
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(client: Client, endpoint: ManagedIdentityEndpoint, client_id: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            client_id,
        }
    }

    pub fn from_env(client: Client) -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let endpoint = match (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => ManagedIdentityEndpoint::AppService { endpoint, header },
            _ => ManagedIdentityEndpoint::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
        };

        Self::new(client, endpoint, var("AZURE_CLIENT_ID"))
    }

    fn build_request(&self, resource: &str) -> reqwest::RequestBuilder {
        let mut query = vec![("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        match &self.endpoint {
            ManagedIdentityEndpoint::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.client
                    .get(endpoint)
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header)
            }
            ManagedIdentityEndpoint::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.client
                    .get(endpoint)
                    .query(&query)
                    .header("Metadata", "true")
                    .timeout(Duration::from_secs(IMDS_PROBE_TIMEOUT_SECS))
            }
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let [scope] = scopes else {
            return Err(CredentialError::Unavailable(format!(
                "managed identity requires exactly one scope, got {}",
                scopes.len()
            )));
        };
        let resource = scope_to_resource(scope);

        let is_imds = matches!(self.endpoint, ManagedIdentityEndpoint::Imds { .. });
        let response = match self.build_request(resource).send().await {
            Ok(response) => response,
            // No metadata service on this host
            Err(e) if is_imds && (e.is_connect() || e.is_timeout()) => {
                return Err(CredentialError::Unavailable(format!(
                    "no managed identity endpoint reachable: {}",
                    e
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // IMDS answers 400 when no identity is assigned to the host
            if is_imds && status.as_u16() == 400 {
                return Err(CredentialError::Unavailable(format!(
                    "no managed identity assigned: {}",
                    body
                )));
            }
            tracing::error!("Managed identity token request failed: status={}", status);
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

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const SCOPE: &str = "https://ossrdbms-aad.database.windows.net/.default";
    const RESOURCE: &str = "https://ossrdbms-aad.database.windows.net";

    #[tokio::test]
    async fn test_imds_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metadata/identity/oauth2/token")
            .match_header("Metadata", "true")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("resource".into(), RESOURCE.into()),
                Matcher::UrlEncoded("api-version".into(), IMDS_API_VERSION.into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"access_token":"imds-token","expires_in":"86399","expires_on":"1900000000","resource":"https://ossrdbms-aad.database.windows.net","token_type":"Bearer"}"#,
            )
            .create_async()
            .await;

        let credential = ManagedIdentityCredential::new(
            Client::new(),
            ManagedIdentityEndpoint::Imds {
                endpoint: format!("{}/metadata/identity/oauth2/token", server.url()),
            },
            None,
        );
        let token = credential.get_token(&[SCOPE]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.value, "imds-token");
        assert_eq!(token.expires_at.timestamp(), 1_900_000_000);
    }

    #[tokio::test]
    async fn test_app_service_token_with_user_assigned_identity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/msi/token")
            .match_header("X-IDENTITY-HEADER", "secret-header")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("resource".into(), RESOURCE.into()),
                Matcher::UrlEncoded("client_id".into(), "user-assigned".into()),
                Matcher::UrlEncoded("api-version".into(), APP_SERVICE_API_VERSION.into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"app-token","expires_on":"1900000000"}"#)
            .create_async()
            .await;

        let credential = ManagedIdentityCredential::new(
            Client::new(),
            ManagedIdentityEndpoint::AppService {
                endpoint: format!("{}/msi/token", server.url()),
                header: "secret-header".to_string(),
            },
            Some("user-assigned".to_string()),
        );
        let token = credential.get_token(&[SCOPE]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.value, "app-token");
    }

    #[tokio::test]
    async fn test_imds_without_identity_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metadata/identity/oauth2/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_request","error_description":"Identity not found"}"#)
            .create_async()
            .await;

        let credential = ManagedIdentityCredential::new(
            Client::new(),
            ManagedIdentityEndpoint::Imds {
                endpoint: format!("{}/metadata/identity/oauth2/token", server.url()),
            },
            None,
        );
        let err = credential.get_token(&[SCOPE]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_app_service_error_is_authentication_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/msi/token")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let credential = ManagedIdentityCredential::new(
            Client::new(),
            ManagedIdentityEndpoint::AppService {
                endpoint: format!("{}/msi/token", server.url()),
                header: "h".to_string(),
            },
            None,
        );
        let err = credential.get_token(&[SCOPE]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Authentication { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_multiple_scopes_rejected() {
        let credential = ManagedIdentityCredential::new(
            Client::new(),
            ManagedIdentityEndpoint::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
            None,
        );
        let err = credential.get_token(&["a", "b"]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Unavailable(_)));
    }
}
