//! Errors surfaced by the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::response::ResponseAssembler;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No snapshot could be produced for the request.
    #[error(transparent)]
    Catalog(#[from] vitrine_core::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Catalog(err) = &self;
        tracing::error!(code = err.code(), error = %err, "catalog request failed");
        ResponseAssembler::build_error(&self.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
    }
}
