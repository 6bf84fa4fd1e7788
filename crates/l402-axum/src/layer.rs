//! Axum middleware for gating routes behind [L402](https://docs.lightning.engineering/the-lightning-network/l402) credentials.
//!
//! The middleware checks `Authorization: L402 <macaroons>:<preimage>` headers, asks an
//! [`AccessAuthority`] to approve the presented macaroons, and answers everything else
//! with a `402 Payment Required` challenge minted by a [`Minter`].
//!
//! ## Example Usage
//!
//! ```rust
//! use axum::{Router, routing::get};
//! use http::request::Parts;
//! use l402_axum::{AccessAuthority, Invoice, L402Middleware, L402Macaroons, Minter, Rejection};
//! use l402_rs::MacaroonMap;
//!
//! #[derive(Clone)]
//! struct Node;
//!
//! impl Minter for Node {
//!     type Challenge = Invoice;
//!     type Error = std::io::Error;
//!
//!     async fn mint_with_challenge(&self, _: &Parts) -> Result<(String, Invoice), Self::Error> {
//!         Ok(("AgJCAAB...".to_string(), Invoice::from("lnbc1...")))
//!     }
//! }
//!
//! #[derive(Clone)]
//! struct Authority;
//!
//! impl AccessAuthority for Authority {
//!     async fn approve_access(&self, _: &Parts, _: &MacaroonMap) -> Option<Rejection> {
//!         None
//!     }
//! }
//!
//! let l402 = L402Middleware::new(Node, Authority);
//!
//! let app: Router = Router::new().route("/protected", get(my_handler).layer(l402));
//!
//! async fn my_handler(macaroons: L402Macaroons) -> String {
//!     format!("paid with {} macaroon(s)", macaroons.len())
//! }
//! ```
//!
//! ## Configuration Notes
//!
//! - **[`L402Middleware::with_error_handler`]** replaces the [`DefaultErrorHandler`] that
//!   answers malformed credentials, wrong preimages and minting failures.
//! - **[`L402Middleware::with_authenticator`]** replaces the [`ChallengeIssuer`] that
//!   answers requests the client may retry.

use axum_core::extract::Request;
use axum_core::response::Response;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use crate::authenticator::{Authenticator, ChallengeIssuer};
use crate::authority::{AccessAuthority, Minter};
use crate::error_handler::{DefaultErrorHandler, ErrorHandler};
use crate::proxy::Proxy;

/// The main L402 middleware instance for enforcing L402 credentials on routes.
///
/// Create a single instance per application and layer it onto protected routes.
#[derive(Clone, Debug)]
pub struct L402Middleware<A, Au, E = DefaultErrorHandler> {
    authority: A,
    authenticator: Au,
    error_handler: E,
}

impl<A, M> L402Middleware<A, ChallengeIssuer<M>>
where
    M: Minter,
{
    /// Creates a middleware that challenges with macaroons minted by `minter` and lets
    /// `authority` decide on presented ones.
    pub fn new(minter: M, authority: A) -> Self {
        Self {
            authority,
            authenticator: ChallengeIssuer::new(minter),
            error_handler: DefaultErrorHandler,
        }
    }
}

impl<A, Au, E> L402Middleware<A, Au, E> {
    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn authenticator(&self) -> &Au {
        &self.authenticator
    }
}

impl<A, Au, E> L402Middleware<A, Au, E>
where
    A: Clone,
    Au: Clone,
    E: Clone,
{
    /// Sets the handler for rejections the client cannot recover from.
    pub fn with_error_handler<E2: ErrorHandler>(
        &self,
        error_handler: E2,
    ) -> L402Middleware<A, Au, E2> {
        L402Middleware {
            authority: self.authority.clone(),
            authenticator: self.authenticator.clone(),
            error_handler,
        }
    }

    /// Sets the authenticator answering requests the client may retry.
    pub fn with_authenticator<Au2: Authenticator>(
        &self,
        authenticator: Au2,
    ) -> L402Middleware<A, Au2, E> {
        L402Middleware {
            authority: self.authority.clone(),
            authenticator,
            error_handler: self.error_handler.clone(),
        }
    }
}

impl<S, A, Au, E> Layer<S> for L402Middleware<A, Au, E>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    A: Clone,
    Au: Clone,
    E: Clone,
{
    type Service = L402MiddlewareService<A, Au, E>;

    fn layer(&self, inner: S) -> Self::Service {
        L402MiddlewareService {
            proxy: Arc::new(Proxy {
                authority: self.authority.clone(),
                authenticator: self.authenticator.clone(),
                error_handler: self.error_handler.clone(),
            }),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Axum service that enforces L402 credentials on incoming requests.
#[derive(Clone)]
pub struct L402MiddlewareService<A, Au, E> {
    /// Credential checks and collaborators, shared by all clones of the service
    proxy: Arc<Proxy<A, Au, E>>,
    /// The inner Axum service being wrapped
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<A, Au, E> Service<Request> for L402MiddlewareService<A, Au, E>
where
    A: AccessAuthority + Send + Sync + 'static,
    Au: Authenticator + Send + Sync + 'static,
    E: ErrorHandler + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    /// Checks the request's L402 credentials and forwards it to the wrapped service if they pass.
    fn call(&mut self, req: Request) -> Self::Future {
        let proxy = self.proxy.clone();
        let inner = self.inner.clone();
        Box::pin(async move { proxy.handle_request(inner, req).await })
    }
}
