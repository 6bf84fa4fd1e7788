//! Building `402 Payment Required` challenges.
//!
//! An [`Authenticator`] answers every request the middleware decides the client may
//! retry: requests without credentials, and requests whose credentials the
//! [`AccessAuthority`](crate::authority::AccessAuthority) turned down. The stock
//! implementation is [`ChallengeIssuer`], which mints a fresh macaroon and payment
//! request through a [`Minter`] and renders them into the `WWW-Authenticate` header:
//!
//! ```text
//! HTTP/1.1 402 Payment Required
//! WWW-Authenticate: L402 macaroon="AgJCAAB...", invoice="lnbc1..."
//! ```

use axum_core::response::{IntoResponse, Response};
use http::header::WWW_AUTHENTICATE;
use http::request::Parts;
use http::{HeaderMap, HeaderValue, StatusCode};
use std::future::Future;

use crate::authority::Minter;
use crate::rejection::{L402Error, PAYMENT_REQUIRED, Rejection};

/// Produces the response sent to a client that may retry.
pub trait Authenticator {
    /// Builds a challenge response for `request`.
    ///
    /// `rejection` is the cause that sent the request here, or `None` for a first-time
    /// request. An `Err` is a terminal fault the middleware routes to its
    /// [`ErrorHandler`](crate::error_handler::ErrorHandler); it must never be rendered
    /// as a 402.
    fn authenticate(
        &self,
        request: &Parts,
        rejection: Option<Rejection>,
    ) -> impl Future<Output = Result<Response, Rejection>> + Send;
}

/// Mints a macaroon and a payment challenge for every rejected request.
#[derive(Debug, Clone)]
pub struct ChallengeIssuer<M> {
    minter: M,
}

impl<M> ChallengeIssuer<M> {
    pub fn new(minter: M) -> Self {
        Self { minter }
    }

    pub fn minter(&self) -> &M {
        &self.minter
    }
}

impl<M> Authenticator for ChallengeIssuer<M>
where
    M: Minter + Sync,
{
    async fn authenticate(
        &self,
        request: &Parts,
        rejection: Option<Rejection>,
    ) -> Result<Response, Rejection> {
        let (macaroon, challenge) = self
            .minter
            .mint_with_challenge(request)
            .await
            .map_err(|err| L402Error::FailedMinting(err.into()))?;

        let mut headers = HeaderMap::new();
        let message = match rejection {
            Some(Rejection::Recoverable(rejection)) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(reason = rejection.reason(), "advising recovery");
                rejection.advise_recovery(&mut headers);
                PAYMENT_REQUIRED.to_string()
            }
            Some(Rejection::Terminal(err)) => err.to_string(),
            None => PAYMENT_REQUIRED.to_string(),
        };

        let challenge = format!("L402 macaroon=\"{macaroon}\", {challenge}");
        let challenge = HeaderValue::try_from(challenge)
            .map_err(|err| L402Error::FailedMinting(err.into()))?;
        headers.append(WWW_AUTHENTICATE, challenge);

        Ok((StatusCode::PAYMENT_REQUIRED, headers, message).into_response())
    }
}
