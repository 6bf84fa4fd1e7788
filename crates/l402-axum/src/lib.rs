//! Axum middleware and helpers for gating routes behind L402 credentials.
//!
//! This crate provides an [`L402Middleware`] Axum layer that lets a request through only
//! when it presents macaroons together with the preimage of the payment they are bound
//! to, and answers everything else with a `402 Payment Required` challenge.
//!
//! ## Quickstart
//!
//! Plug in a [`Minter`] that issues macaroons and invoices, and an [`AccessAuthority`]
//! that verifies presented macaroons:
//!
//! ```rust,ignore
//! let l402 = L402Middleware::new(minter, authority);
//! let app: Router = Router::new().route("/paywall", get(my_handler).layer(l402));
//! ```
//!
//! See [`layer`] for a complete example, and [`L402Macaroons`] for reading the verified
//! macaroons from a handler.
//!
//! ## Feature Flags
//!
//! - `telemetry` - Enables tracing of routing decisions and a span around each request

pub mod authenticator;
pub mod authority;
pub mod error_handler;
pub mod extract;
pub mod layer;
pub mod proxy;
pub mod rejection;

pub use authenticator::{Authenticator, ChallengeIssuer};
pub use authority::{AccessAuthority, Invoice, Minter};
pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use extract::L402Macaroons;
pub use layer::L402Middleware;
pub use rejection::{L402Error, RecoverableRejection, RecoveryAdvice, Rejection};
