//! HTTP routes for the catalog.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use vitrine_core::RefreshCoordinator;

use crate::cors::{CorsPolicy, request_origin};
use crate::error::ApiError;
use crate::response::{ResponseAssembler, matches_if_none_match};

/// Shared state for the catalog routes.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: RefreshCoordinator,
    pub cors: Arc<CorsPolicy>,
    pub assembler: ResponseAssembler,
}

impl AppState {
    pub fn new(coordinator: RefreshCoordinator, cors: CorsPolicy) -> Self {
        let assembler = ResponseAssembler::new(coordinator.policy().ttl());
        Self { coordinator, cors: Arc::new(cors), assembler }
    }
}

/// GET /products
async fn get_products(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let cors = state.cors.resolve_cors_headers(request_origin(&headers));
    let served = state.coordinator.serve().await?;

    if matches_if_none_match(&headers, &served.snapshot.validator) {
        return Ok(state.assembler.not_modified(&served, cors));
    }
    Ok(state.assembler.build(&served, cors))
}

/// OPTIONS /products
///
/// Answers the preflight from the CORS policy alone.
async fn preflight(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cors = state.cors.resolve_cors_headers(request_origin(&headers));
    (StatusCode::NO_CONTENT, cors).into_response()
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/products", get(get_products).options(preflight))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
