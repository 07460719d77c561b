// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while acquiring an access token from Azure
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The credential source is not configured or not reachable.
    /// The default chain moves on to the next source on this error.
    #[error("Credential unavailable: {0}")]
    Unavailable(String),

    /// The token endpoint rejected the request
    #[error("Authentication failed: {status} - {message}")]
    Authentication { status: u16, message: String },

    /// Transport-level failure talking to a token endpoint
    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint answered with something we could not understand
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Azure CLI exited with an error
    #[error("Azure CLI error: {0}")]
    Cli(String),
}

/// Errors raised while producing or opening a database connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// A required connection field resolved empty
    #[error("missing environment variable {0}")]
    MissingField(&'static str),

    /// Token acquisition failed; surfaced unchanged
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Postgres driver failure; surfaced unchanged
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database connection error")]
    DatabaseConnection(#[source] ConnectionError),

    #[error("Error fetching product")]
    FetchProduct(#[source] sqlx::Error),

    #[error("Error encoding JSON")]
    EncodeJson(#[source] serde_json::Error),

    #[error("Not implemented")]
    NotImplemented,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::DatabaseConnection(err) => {
                tracing::error!("Database connection error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::FetchProduct(err) => {
                tracing::error!("Error fetching product: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::EncodeJson(err) => {
                tracing::error!("Error encoding JSON: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        };

        // Plain-text body with a trailing newline, like net/http-style error pages
        (status, format!("{}\n", self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = ConnectionError::MissingField("PGHOST");
        assert_eq!(err.to_string(), "missing environment variable PGHOST");
    }

    #[test]
    fn test_credential_error_is_transparent() {
        let err = ConnectionError::from(CredentialError::Authentication {
            status: 401,
            message: "invalid_client".to_string(),
        });
        assert_eq!(err.to_string(), "Authentication failed: 401 - invalid_client");
    }

    #[test]
    fn test_database_error_is_transparent() {
        let err = ConnectionError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), sqlx::Error::RowNotFound.to_string());
    }

    #[test]
    fn test_credential_error_messages() {
        let err = CredentialError::Unavailable("no managed identity".to_string());
        assert_eq!(err.to_string(), "Credential unavailable: no managed identity");

        let err = CredentialError::Cli("ERROR: subscription not found".to_string());
        assert_eq!(err.to_string(), "Azure CLI error: ERROR: subscription not found");
    }

    #[test]
    fn test_api_error_messages() {
        let err = ApiError::DatabaseConnection(ConnectionError::MissingField("PGUSER"));
        assert_eq!(err.to_string(), "Database connection error");

        let err = ApiError::FetchProduct(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "Error fetching product");

        assert_eq!(ApiError::NotImplemented.to_string(), "Not implemented");
    }

    #[tokio::test]
    async fn test_error_response_conversion() {
        let err = ApiError::DatabaseConnection(ConnectionError::MissingField("PGHOST"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::FetchProduct(sqlx::Error::RowNotFound);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError::NotImplemented.into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_error_response_body_is_plain_text() {
        let response = ApiError::NotImplemented.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"Not implemented\n");
    }
}
