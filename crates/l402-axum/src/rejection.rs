//! Structured causes for turning a request away.
//!
//! Every failed request produces exactly one [`Rejection`], which is moved into exactly
//! one consumer: the [`Authenticator`](crate::authenticator::Authenticator) when the
//! client may retry, or the [`ErrorHandler`](crate::error_handler::ErrorHandler) when
//! it may not.
//!
//! Whether a rejection can advise the client on how to recover is fixed when it is
//! built: [`Rejection::Recoverable`] carries a [`RecoveryAdvice`] that writes a
//! machine-readable hint into the response headers, [`Rejection::Terminal`] carries
//! only its message.

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use l402_rs::CredentialError;
use std::fmt::{Debug, Display, Formatter};

/// Boxed error returned by collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of a 402 response when there is nothing more specific to say.
pub const PAYMENT_REQUIRED: &str = "payment required";

/// `Authentication-Info` response header (RFC 7615).
pub const AUTHENTICATION_INFO: HeaderName = HeaderName::from_static("authentication-info");

/// Failures of the L402 pipeline.
#[derive(Debug, thiserror::Error)]
pub enum L402Error {
    /// No `Authorization: L402 ...` header was presented.
    #[error("payment required")]
    MissingCredential,
    /// The credential part of the header could not be decoded.
    #[error("invalid macaroon: {0}")]
    InvalidMacaroon(#[source] CredentialError),
    /// The preimage does not hash to the payment hash of every presented macaroon.
    #[error("invalid preimage")]
    InvalidPreimage,
    /// An access authority turned the request down. The message is shown to the client.
    #[error("{0}")]
    AccessDenied(String),
    /// A fresh macaroon and challenge could not be minted.
    #[error("failed macaroon minting: {0}")]
    FailedMinting(#[source] BoxError),
}

impl L402Error {
    /// Status used when this error reaches an error handler.
    ///
    /// Challenges and access denials are rendered as 402 by the authenticator, so
    /// only malformed credentials count as client faults here.
    pub fn status_code(&self) -> StatusCode {
        match self {
            L402Error::InvalidMacaroon(_) | L402Error::InvalidPreimage => StatusCode::BAD_REQUEST,
            L402Error::MissingCredential
            | L402Error::AccessDenied(_)
            | L402Error::FailedMinting(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Writes a recovery hint into the headers of a 402 response.
///
/// Recovery usually means retrying with a macaroon carrying less restrictive caveats,
/// which does not require a new payment.
pub trait RecoveryAdvice: Debug + Send + Sync {
    fn advise_recovery(&self, headers: &mut HeaderMap);
}

/// Advice delivered verbatim in the `Authentication-Info` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationInfo(pub HeaderValue);

impl RecoveryAdvice for AuthenticationInfo {
    fn advise_recovery(&self, headers: &mut HeaderMap) {
        headers.append(AUTHENTICATION_INFO, self.0.clone());
    }
}

/// A rejection the client can recover from without paying again.
#[derive(Debug)]
pub struct RecoverableRejection {
    reason: String,
    advice: Box<dyn RecoveryAdvice>,
}

impl RecoverableRejection {
    pub fn new(reason: impl Into<String>, advice: impl RecoveryAdvice + 'static) -> Self {
        Self {
            reason: reason.into(),
            advice: Box::new(advice),
        }
    }

    /// Server-side reason. Not sent to the client.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn advise_recovery(&self, headers: &mut HeaderMap) {
        self.advice.advise_recovery(headers);
    }
}

impl Display for RecoverableRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Why a request was not let through.
#[derive(Debug)]
pub enum Rejection {
    Terminal(L402Error),
    Recoverable(RecoverableRejection),
}

impl Rejection {
    /// Terminal denial whose message is shown to the client as is.
    pub fn denied(message: impl Into<String>) -> Self {
        Rejection::Terminal(L402Error::AccessDenied(message.into()))
    }

    /// Recoverable denial whose advice goes to the `Authentication-Info` header.
    pub fn recoverable(reason: impl Into<String>, authentication_info: HeaderValue) -> Self {
        Rejection::Recoverable(RecoverableRejection::new(
            reason,
            AuthenticationInfo(authentication_info),
        ))
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Rejection::Recoverable(_))
    }

    pub fn as_error(&self) -> Option<&L402Error> {
        match self {
            Rejection::Terminal(err) => Some(err),
            Rejection::Recoverable(_) => None,
        }
    }

    /// Status used when this rejection reaches an error handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::Terminal(err) => err.status_code(),
            Rejection::Recoverable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text for the response body.
    ///
    /// Terminal causes are rendered verbatim, wrapped detail included. Recoverable
    /// causes render the generic [`PAYMENT_REQUIRED`] message; their hint travels in a
    /// header instead.
    pub fn client_message(&self) -> String {
        match self {
            Rejection::Terminal(err) => err.to_string(),
            Rejection::Recoverable(_) => PAYMENT_REQUIRED.to_string(),
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Terminal(err) => Display::fmt(err, f),
            Rejection::Recoverable(rejection) => Display::fmt(rejection, f),
        }
    }
}

impl From<L402Error> for Rejection {
    fn from(err: L402Error) -> Self {
        Rejection::Terminal(err)
    }
}

impl From<RecoverableRejection> for Rejection {
    fn from(rejection: RecoverableRejection) -> Self {
        Rejection::Recoverable(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_messages() {
        let err = L402Error::InvalidMacaroon(CredentialError::EmptyCredentialData);
        assert_eq!(err.to_string(), "invalid macaroon: empty credential data");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = L402Error::FailedMinting("node unreachable".into());
        assert_eq!(err.to_string(), "failed macaroon minting: node unreachable");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(L402Error::MissingCredential.to_string(), PAYMENT_REQUIRED);
        assert_eq!(
            Rejection::denied("revoked").client_message(),
            "revoked".to_string()
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(L402Error::InvalidPreimage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            L402Error::MissingCredential.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Rejection::denied("revoked").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Rejection::recoverable("tier too low", HeaderValue::from_static("tier=premium"))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_recoverable_keeps_reason_out_of_body() {
        let rejection = Rejection::recoverable(
            "tier too low",
            HeaderValue::from_static("tier=premium"),
        );
        assert!(rejection.is_recoverable());
        assert!(rejection.as_error().is_none());
        assert_eq!(rejection.to_string(), "tier too low");
        assert_eq!(rejection.client_message(), PAYMENT_REQUIRED);
    }

    #[test]
    fn test_authentication_info_advice() {
        let Rejection::Recoverable(rejection) =
            Rejection::recoverable("reason", HeaderValue::from_static("tier=premium"))
        else {
            panic!("expected a recoverable rejection");
        };
        let mut headers = HeaderMap::new();
        rejection.advise_recovery(&mut headers);
        assert_eq!(headers.get(AUTHENTICATION_INFO).unwrap(), "tier=premium");
        assert_eq!(headers.len(), 1);
    }
}
