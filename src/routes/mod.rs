use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use chrono::{Local, SecondsFormat};
use std::sync::Arc;

use crate::db::{self, ConnectionProvider, Product};
use crate::error::ApiError;
use crate::middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ConnectionProvider>,
}

/// Health check routes (no database access)
pub fn health_routes() -> Router {
    Router::new().route("/healthz", get(health_handler))
}

/// Product routes; unmatched paths fall through to the random product
pub fn product_routes(state: AppState) -> Router {
    Router::new()
        .route("/", any(random_product_handler))
        .route("/image", get(image_handler))
        .fallback(random_product_handler)
        .with_state(state)
}

/// Build the application with all routes and middleware
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(product_routes(state))
        .layer(middleware::request_log_layer())
}

/// GET /healthz - Current server time as RFC 3339
async fn health_handler() -> (StatusCode, String) {
    (
        StatusCode::OK,
        format!("{}\n", Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    )
}

/// GET / - One random product as indented JSON
///
/// Opens a fresh connection per request and closes it on every path.
async fn random_product_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut conn = state
        .provider
        .open()
        .await
        .map_err(ApiError::DatabaseConnection)?;

    let product = db::fetch_random_product(&mut conn).await;
    db::close(conn).await;
    let product = product.map_err(ApiError::FetchProduct)?;

    product_response(&product)
}

/// Render a product as 2-space indented JSON with a trailing newline
fn product_response(product: &Product) -> Result<Response, ApiError> {
    let mut body = serde_json::to_string_pretty(product).map_err(ApiError::EncodeJson)?;
    body.push('\n');

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// GET /image - Not implemented yet
async fn image_handler() -> ApiError {
    ApiError::NotImplemented
}
