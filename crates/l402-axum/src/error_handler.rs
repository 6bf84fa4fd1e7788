//! Responses for rejections the client cannot recover from by retrying.

use axum_core::response::{IntoResponse, Response};
use http::request::Parts;

use crate::rejection::Rejection;

/// Renders a terminal [`Rejection`].
///
/// Receives malformed credentials, preimage mismatches and minting failures. Implemented
/// for any `Fn(&Parts, Rejection) -> Response` closure.
pub trait ErrorHandler {
    fn handle_error(&self, request: &Parts, rejection: Rejection) -> Response;
}

impl<F> ErrorHandler for F
where
    F: Fn(&Parts, Rejection) -> Response,
{
    fn handle_error(&self, request: &Parts, rejection: Rejection) -> Response {
        self(request, rejection)
    }
}

/// `400 Bad Request` for malformed macaroons and wrong preimages, `500 Internal Server
/// Error` for everything else. The body is the rejection message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle_error(&self, _request: &Parts, rejection: Rejection) -> Response {
        let status = rejection.status_code();
        #[cfg(feature = "telemetry")]
        tracing::warn!(status = status.as_u16(), error = %rejection, "L402 request failed");
        (status, rejection.client_message()).into_response()
    }
}
