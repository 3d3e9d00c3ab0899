//! HTTP mapping for service errors
//!
//! Validation problems and bad references come back as 400 with a
//! descriptive message, a wrong researcher password as 401, lookup misses as
//! 404. Anything internal is logged and surfaced as an opaque 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use studybank_common::Error;

/// Wrapper turning common errors into JSON error responses
///
/// Handlers return `Result<_, ApiError>` and use `?` on anything producing a
/// [`studybank_common::Error`].
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            Error::InvalidInput(message) => (StatusCode::BAD_REQUEST, message),
            Error::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Error::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            err => {
                error!("Internal error handling request: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
