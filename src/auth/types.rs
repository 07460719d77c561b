// Authentication types

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::fmt;

use crate::error::CredentialError;

/// Lifetime assumed when a token endpoint omits expiry information
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Short-lived bearer token issued by Azure AD
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Azure endpoints disagree on whether numeric fields are JSON numbers or strings
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(i64),
    String(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::String(s) => s.trim().parse().ok(),
        }
    }
}

/// Token response from Entra ID, IMDS and App Service managed identity
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<NumberOrString>,
    #[serde(default)]
    pub expires_on: Option<NumberOrString>,
}

impl TokenResponse {
    /// Resolve the absolute expiry, preferring `expires_on` (epoch seconds)
    pub fn into_access_token(self, now: DateTime<Utc>) -> Result<AccessToken, CredentialError> {
        if self.access_token.is_empty() {
            return Err(CredentialError::InvalidResponse(
                "response does not contain access_token".to_string(),
            ));
        }

        let expires_at = match (&self.expires_on, &self.expires_in) {
            (Some(on), _) => epoch_to_datetime(on)?,
            (None, Some(secs)) => {
                let secs = secs.as_i64().ok_or_else(|| {
                    CredentialError::InvalidResponse(format!("invalid expires_in: {:?}", secs))
                })?;
                now + Duration::seconds(secs)
            }
            (None, None) => {
                tracing::warn!(
                    "Token response has no expiry, assuming {} seconds",
                    DEFAULT_EXPIRES_IN_SECS
                );
                now + Duration::seconds(DEFAULT_EXPIRES_IN_SECS)
            }
        };

        Ok(AccessToken::new(self.access_token, expires_at))
    }
}

/// `az account get-access-token --output json` payload
#[derive(Deserialize, Debug)]
pub struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Epoch seconds; only emitted by Azure CLI 2.54 and newer
    #[serde(default)]
    pub expires_on: Option<NumberOrString>,
    /// Local wall-clock time, e.g. `2024-05-01 10:15:30.000000`
    #[serde(rename = "expiresOn", default)]
    pub expires_on_local: Option<String>,
}

impl CliTokenResponse {
    pub fn into_access_token(self) -> Result<AccessToken, CredentialError> {
        if self.access_token.is_empty() {
            return Err(CredentialError::InvalidResponse(
                "Azure CLI output does not contain accessToken".to_string(),
            ));
        }

        let expires_at = match (&self.expires_on, &self.expires_on_local) {
            (Some(on), _) => epoch_to_datetime(on)?,
            (None, Some(local)) => parse_cli_local_time(local)?,
            (None, None) => {
                return Err(CredentialError::InvalidResponse(
                    "Azure CLI output does not contain an expiry".to_string(),
                ))
            }
        };

        Ok(AccessToken::new(self.access_token, expires_at))
    }
}

fn epoch_to_datetime(value: &NumberOrString) -> Result<DateTime<Utc>, CredentialError> {
    value
        .as_i64()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| CredentialError::InvalidResponse(format!("invalid expires_on: {:?}", value)))
}

fn parse_cli_local_time(value: &str) -> Result<DateTime<Utc>, CredentialError> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| CredentialError::InvalidResponse(format!("invalid expiresOn {value:?}: {e}")))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CredentialError::InvalidResponse(format!("invalid expiresOn {value:?}")))
}

/// Resource-style identifier for managed identity endpoints, which predate scopes
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}
