//! Access to the verified credentials from downstream handlers.

use axum_core::extract::FromRequestParts;
use axum_core::response::{IntoResponse, Response};
use http::StatusCode;
use http::request::Parts;
use l402_rs::MacaroonMap;
use std::ops::Deref;
use std::sync::Arc;

/// The macaroons presented with a request, keyed by identifier.
///
/// The middleware stores this in the request extensions once the preimage checks out,
/// so every handler behind it can take it as an argument:
///
/// ```rust
/// use l402_axum::L402Macaroons;
///
/// async fn my_handler(L402Macaroons(macaroons): L402Macaroons) -> String {
///     format!("presented {} macaroon(s)", macaroons.len())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct L402Macaroons(pub Arc<MacaroonMap>);

impl Deref for L402Macaroons {
    type Target = MacaroonMap;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The handler is not behind the L402 middleware.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("L402 macaroons missing from request extensions")]
pub struct MissingMacaroons;

impl IntoResponse for MissingMacaroons {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

impl<S> FromRequestParts<S> for L402Macaroons
where
    S: Send + Sync,
{
    type Rejection = MissingMacaroons;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<L402Macaroons>()
            .cloned()
            .ok_or(MissingMacaroons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    #[tokio::test]
    async fn test_extract_from_extensions() {
        let (mut parts, _) = Request::get("/").body(()).unwrap().into_parts();
        parts
            .extensions
            .insert(L402Macaroons(Arc::new(MacaroonMap::new())));
        let macaroons = L402Macaroons::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(macaroons.is_empty());
    }

    #[tokio::test]
    async fn test_missing_extension() {
        let (mut parts, _) = Request::get("/").body(()).unwrap().into_parts();
        let rejection = L402Macaroons::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
