//! The per-request L402 pipeline.
//!
//! [`Proxy`] runs every request through the same steps:
//!
//! 1. Find an `Authorization: L402 <macaroons>:<preimage>` header. Without one the client
//!    is challenged to pay.
//! 2. Decode the macaroons. A malformed credential is a client error.
//! 3. Check that SHA-256 of the preimage equals the payment hash of **every** macaroon.
//!    A mismatch is a client error.
//! 4. Store the decoded macaroons in the request extensions as [`L402Macaroons`].
//! 5. Ask the [`AccessAuthority`] to approve access. A rejection sends the client back to
//!    the challenge, so it may retry with other macaroons without paying again.
//!
//! Requests that pass all steps are forwarded to the inner service. Each failed step ends
//! in exactly one [`Denial`], answered either by the [`Authenticator`] or by the
//! [`ErrorHandler`]. Nothing is retried.

use axum_core::response::{IntoResponse, Response};
use http::header::AUTHORIZATION;
use http::request::Parts;
use http::HeaderMap;
use l402_rs::identifier::BLOCK_SIZE;
use l402_rs::{MacaroonMap, PaymentHash, unmarshal_macaroons};
use once_cell::sync::Lazy;
use regex::Regex;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

#[cfg(feature = "telemetry")]
use tracing::Instrument;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::authenticator::Authenticator;
use crate::authority::AccessAuthority;
use crate::error_handler::ErrorHandler;
use crate::extract::L402Macaroons;
use crate::rejection::{L402Error, Rejection};

// ============================================================================
// Authorization header
// ============================================================================

/// `L402 <macaroons>:<preimage>`, preimage being exactly 64 lowercase hex characters.
/// Anything but another hex digit may follow the preimage.
static L402_AUTHORIZATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"L402 ([^:\s]*?):([a-f0-9]{64})(?:$|[^a-f0-9])")
        .expect("Invalid L402 authorization regex")
});

/// Returns the base64 macaroons and the hex preimage of the first `Authorization` header
/// value carrying L402 credentials.
pub fn find_l402_authorization(headers: &HeaderMap) -> Option<(&str, &str)> {
    headers
        .get_all(AUTHORIZATION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let captures = L402_AUTHORIZATION.captures(value)?;
            let macaroons = captures.get(1)?.as_str();
            let preimage = captures.get(2)?.as_str();
            Some((macaroons, preimage))
        })
}

/// True if the preimage hashes to the payment hash of every macaroon in the map.
///
/// An empty map, or a preimage that is not a 32-byte hex string, never validates.
pub fn validate_preimage(macaroons: &MacaroonMap, preimage_hex: &str) -> bool {
    let mut preimage = [0u8; BLOCK_SIZE];
    if hex::decode_to_slice(preimage_hex, &mut preimage).is_err() {
        return false;
    }
    let payment_hash = PaymentHash::of_preimage(&preimage);
    !macaroons.is_empty()
        && macaroons
            .keys()
            .all(|identifier| identifier.payment_hash == payment_hash)
}

// ============================================================================
// Proxy
// ============================================================================

/// How a request that failed validation is answered.
#[derive(Debug)]
pub enum Denial {
    /// The client may retry; answered by the [`Authenticator`] with a 402 challenge.
    Challenge(Rejection),
    /// Protocol or client fault; answered by the [`ErrorHandler`].
    Error(Rejection),
}

/// Validates L402 credentials and routes every request to exactly one of the inner
/// service, the authenticator, or the error handler.
#[derive(Debug, Clone)]
pub struct Proxy<A, Au, E> {
    pub authority: A,
    pub authenticator: Au,
    pub error_handler: E,
}

impl<A, Au, E> Proxy<A, Au, E>
where
    A: AccessAuthority + Sync,
    Au: Authenticator + Sync,
    E: ErrorHandler + Sync,
{
    /// Handles an incoming request.
    ///
    /// Forwards the request to `inner` if its credentials are valid and approved.
    /// Otherwise responds with a challenge or an error, without calling `inner`.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "l402.handle_request", skip_all)
    )]
    pub async fn handle_request<ReqBody, S>(
        &self,
        inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<Response, Infallible>
    where
        S: Service<http::Request<ReqBody>>,
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        let (mut parts, body) = req.into_parts();
        let response = match self.authorize(&mut parts).await {
            Ok(()) => match Self::call_inner(inner, http::Request::from_parts(parts, body)).await
            {
                Ok(response) => response.into_response(),
                Err(err) => err.into_response(),
            },
            Err(Denial::Challenge(rejection)) => self.challenge(&parts, Some(rejection)).await,
            Err(Denial::Error(rejection)) => self.error_handler.handle_error(&parts, rejection),
        };
        Ok(response)
    }

    /// Runs the validation steps, leaving [`L402Macaroons`] in the request extensions
    /// once the preimage checks out.
    pub async fn authorize(&self, parts: &mut Parts) -> Result<(), Denial> {
        let Some((macaroons_base64, preimage_hex)) = find_l402_authorization(&parts.headers)
        else {
            #[cfg(feature = "telemetry")]
            tracing::debug!("No L402 authorization header, challenging");
            return Err(Denial::Challenge(L402Error::MissingCredential.into()));
        };

        let macaroons = unmarshal_macaroons(macaroons_base64).map_err(|err| {
            #[cfg(feature = "telemetry")]
            tracing::debug!(error = %err, "Undecodable L402 macaroons");
            Denial::Error(L402Error::InvalidMacaroon(err).into())
        })?;

        if !validate_preimage(&macaroons, preimage_hex) {
            #[cfg(feature = "telemetry")]
            tracing::debug!(count = macaroons.len(), "L402 preimage does not match");
            return Err(Denial::Error(L402Error::InvalidPreimage.into()));
        }

        let macaroons = Arc::new(macaroons);
        parts
            .extensions
            .insert(L402Macaroons(Arc::clone(&macaroons)));

        match self.authority.approve_access(parts, &macaroons).await {
            None => Ok(()),
            Some(rejection) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(
                    recoverable = rejection.is_recoverable(),
                    reason = %rejection,
                    "L402 access rejected, challenging"
                );
                Err(Denial::Challenge(rejection))
            }
        }
    }

    /// Answers with the authenticator, falling back to the error handler if no challenge
    /// can be built.
    pub async fn challenge(&self, parts: &Parts, rejection: Option<Rejection>) -> Response {
        match self.authenticator.authenticate(parts, rejection).await {
            Ok(response) => response,
            Err(rejection) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(error = %rejection, "Could not issue L402 challenge");
                self.error_handler.handle_error(parts, rejection)
            }
        }
    }

    async fn call_inner<ReqBody, S>(
        mut inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<S::Response, S::Error>
    where
        S: Service<http::Request<ReqBody>>,
        S::Future: Send,
    {
        #[cfg(feature = "telemetry")]
        {
            inner
                .call(req)
                .instrument(tracing::info_span!("inner"))
                .await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            inner.call(req).await
        }
    }
}
