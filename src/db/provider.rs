use chrono::{DateTime, Duration, Utc};
use sqlx::{Connection, PgConnection};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::params::{ConnectionParameters, DatabaseConfig};
use crate::auth::{AccessToken, TokenCredential};
use crate::error::ConnectionError;

/// Entra ID scope for Azure Database for PostgreSQL
pub const DATABASE_SCOPE: &str = "https://ossrdbms-aad.database.windows.net/.default";

/// Refresh tokens this long before they expire, so a connection opened right
/// after rendering cannot see the token lapse mid-handshake
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Hands out connection parameters whose password is a cached Azure AD token
///
/// The token slot is locked across check, refresh and render, so concurrent
/// callers never issue redundant token requests.
pub struct ConnectionProvider {
    config: DatabaseConfig,
    credential: Arc<dyn TokenCredential>,
    token: Mutex<Option<AccessToken>>,
}

impl ConnectionProvider {
    pub fn new(config: DatabaseConfig, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            config,
            credential,
            token: Mutex::new(None),
        }
    }

    /// Create a provider with a token already cached
    #[cfg(test)]
    fn with_cached_token(
        config: DatabaseConfig,
        credential: Arc<dyn TokenCredential>,
        token: AccessToken,
    ) -> Self {
        Self {
            config,
            credential,
            token: Mutex::new(Some(token)),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Parameters authenticated with a valid token, refreshing it when
    /// missing or inside the refresh margin
    pub async fn connection_string(&self) -> Result<ConnectionParameters, ConnectionError> {
        let mut slot = self.token.lock().await;

        if needs_refresh(slot.as_ref(), Utc::now()) {
            tracing::debug!("Refreshing database access token...");
            let token = self.credential.get_token(&[DATABASE_SCOPE]).await?;
            tracing::info!(
                "Database access token refreshed, expires: {}",
                token.expires_at.to_rfc3339()
            );
            *slot = Some(token);
        }

        let password = slot.as_ref().map(|t| t.value.as_str()).unwrap_or_default();
        self.config.parameters(password)
    }

    /// Parameters using the configured static password; no token is requested
    pub fn connection_string_from_password(&self) -> Result<ConnectionParameters, ConnectionError> {
        self.config
            .parameters(self.config.password.as_deref().unwrap_or_default())
    }

    /// Open a single connection; the caller must close it when done
    pub async fn open(&self) -> Result<PgConnection, ConnectionError> {
        let params = self.connection_string().await?;
        let options = params.connect_options()?;

        tracing::debug!(
            "Connecting to postgres: host={}, dbname={}, user={}",
            params.host,
            params.database,
            params.user
        );
        let conn = PgConnection::connect_with(&options).await?;
        Ok(conn)
    }
}

/// Token is absent or expires within the refresh margin
fn needs_refresh(token: Option<&AccessToken>, now: DateTime<Utc>) -> bool {
    match token {
        None => true,
        Some(token) => token.expires_at - now < Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
    }
}
