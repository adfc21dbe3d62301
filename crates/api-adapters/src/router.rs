//! Routes and the tower-http layer stack.

use std::time::Duration;

use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::cookies::X_SET_COOKIE;
use crate::handlers::{self, AppState};

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let cors = cors_layer(state.hosts());
    let routes = Router::new()
        .route("/", get(handlers::fetch))
        .route("/new", post(handlers::create))
        .route("/id/{id}", get(handlers::view))
        .route("/count", post(handlers::count))
        .route("/preview", post(handlers::preview))
        .route("/ping", get(handlers::ping))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors);
    apply_standard_layers(routes, request_timeout)
}

/// Cross-origin access for the embedding sites only.
fn cors_layer(hosts: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = hosts
        .iter()
        .filter_map(|host| HeaderValue::from_str(host).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([X_SET_COOKIE])
        .max_age(Duration::from_secs(86_400))
}

/// Tracing, request ids, timeout and body limit.
pub fn apply_standard_layers(router: Router, request_timeout: Duration) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let request_id_header = HeaderName::from_static("x-request-id");

    router
        .layer(trace)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}
