//! Collaborators the middleware delegates to.
//!
//! The middleware never signs, verifies signatures, or talks to a payment node itself.
//! A [`Minter`] issues fresh macaroons together with a payment challenge, and an
//! [`AccessAuthority`] decides whether presented macaroons grant access to the
//! requested resource. Both may perform I/O and are expected to honor their own
//! deadlines: the middleware neither times them out nor retries them.

use http::request::Parts;
use l402_rs::MacaroonMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;

use crate::rejection::{BoxError, Rejection};

/// Issues a fresh macaroon and the payment challenge that unlocks it.
pub trait Minter {
    /// Rendered after the macaroon in the `WWW-Authenticate` header, e.g. `invoice="lnbc..."`.
    type Challenge: Display + Send;
    type Error: Into<BoxError>;

    /// Mints a macaroon for `request`.
    ///
    /// Returns the base64 encoded macaroon and its challenge.
    fn mint_with_challenge(
        &self,
        request: &Parts,
    ) -> impl Future<Output = Result<(String, Self::Challenge), Self::Error>> + Send;
}

/// Checks macaroon signatures and caveats, and authorizes the requested resource.
pub trait AccessAuthority {
    /// Returns `None` to let the request through.
    ///
    /// Any returned [`Rejection`] sends the client back to the challenge path, so it may
    /// retry with other macaroons without paying again.
    fn approve_access(
        &self,
        request: &Parts,
        macaroons: &MacaroonMap,
    ) -> impl Future<Output = Option<Rejection>> + Send;
}

impl<T: Minter> Minter for Arc<T> {
    type Challenge = T::Challenge;
    type Error = T::Error;

    fn mint_with_challenge(
        &self,
        request: &Parts,
    ) -> impl Future<Output = Result<(String, Self::Challenge), Self::Error>> + Send {
        self.as_ref().mint_with_challenge(request)
    }
}

impl<T: AccessAuthority> AccessAuthority for Arc<T> {
    fn approve_access(
        &self,
        request: &Parts,
        macaroons: &MacaroonMap,
    ) -> impl Future<Output = Option<Rejection>> + Send {
        self.as_ref().approve_access(request, macaroons)
    }
}

/// A BOLT 11 payment request, rendered as `invoice="<value>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice(pub String);

impl Display for Invoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invoice=\"{}\"", self.0)
    }
}

impl From<String> for Invoice {
    fn from(value: String) -> Self {
        Invoice(value)
    }
}

impl From<&str> for Invoice {
    fn from(value: &str) -> Self {
        Invoice(value.to_string())
    }
}
