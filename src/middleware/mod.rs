// Request logging middleware

use axum::{extract::ConnectInfo, http::Request};
use std::net::SocketAddr;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultMakeSpan, OnRequest, TraceLayer},
};
use tracing::Span;

/// Logs remote address, method and URL of every incoming request
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRequest;

impl<B> OnRequest<B> for LogRequest {
    fn on_request(&mut self, request: &Request<B>, _span: &Span) {
        tracing::info!(
            remote_addr = %remote_addr(request),
            method = %request.method(),
            url = %request.uri(),
            "httpLog"
        );
    }
}

/// Peer address, or `-` when the server was not built with
/// `into_make_service_with_connect_info`
fn remote_addr<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Create the request logging layer
pub fn request_log_layer(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, DefaultMakeSpan, LogRequest> {
    TraceLayer::new_for_http().on_request(LogRequest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_layer_passes_requests_through() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(request_log_layer());

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_remote_addr_from_connect_info() {
        let mut request = Request::builder()
            .uri("/healthz?verbose=1")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("10.0.0.7:51234".parse::<SocketAddr>().unwrap()));

        assert_eq!(remote_addr(&request), "10.0.0.7:51234");
    }

    #[test]
    fn test_remote_addr_without_connect_info() {
        let request = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(remote_addr(&request), "-");
    }
}
