//! Core Rust implementation of the L402 credential format.
//!
//! L402 gates HTTP resources behind a macaroon plus proof of payment. A client presents
//!
//! ```text
//! Authorization: L402 <base64 macaroons>:<hex preimage>
//! ```
//!
//! and the server checks that the SHA-256 of the preimage equals the payment hash baked
//! into every presented macaroon.
//!
//! This crate holds the protocol pieces that do not depend on any HTTP framework. The
//! axum/tower middleware lives in the `l402-axum` crate.
//!
//! # Modules
//!
//! - [`identifier`] — The 66-byte [`Identifier`](identifier::Identifier) embedded in every macaroon.
//! - [`macaroon`] — Structural codec for the macaroon V2 binary format. No signing.
//! - [`credentials`] — Base64 wire form of a list of macaroons, decoded into a map keyed by identifier.
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing of decoding decisions

pub mod credentials;
pub mod identifier;
pub mod macaroon;

pub use credentials::{CredentialError, MacaroonMap, marshal_macaroons, unmarshal_macaroons};
pub use identifier::{Identifier, PaymentHash, TokenId, UnknownVersion};
pub use macaroon::{Caveat, Macaroon, MacaroonError};
