//! Web error handling.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::NovynyError;

/// Error wrapper for handlers, so `?` works on store and cache calls.
/// Every wrapped error is a backend failure; nothing the client sent can
/// produce one.
#[derive(Debug)]
pub struct WebError(NovynyError);

impl From<NovynyError> for WebError {
    fn from(e: NovynyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_error_maps_to_500() {
        let err = WebError(NovynyError::Store("backend down".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
