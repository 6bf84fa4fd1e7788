//! Stand-ins for a Lightning node and a macaroon service.
//!
//! Nothing here talks to a real node or signs anything: the minter hands out unsigned
//! macaroons and logs the preimage that unlocks them, so the flow can be tried with curl.

use http::HeaderValue;
use http::request::Parts;
use l402_axum::{AccessAuthority, Invoice, Minter, Rejection};
use l402_rs::credentials::marshal_macaroon;
use l402_rs::identifier::BLOCK_SIZE;
use l402_rs::{Caveat, CredentialError, Identifier, Macaroon, MacaroonMap, PaymentHash, TokenId};

/// Caveat granting access to the `/premium` routes.
pub const PREMIUM_TIER: &str = "tier=premium";

#[derive(Debug, thiserror::Error)]
pub enum MintError {
    #[error(transparent)]
    Identifier(#[from] l402_rs::UnknownVersion),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Mints unsigned macaroons bound to a fresh random preimage.
#[derive(Debug, Clone)]
pub struct DemoMinter {
    invoice: String,
    location: String,
}

impl DemoMinter {
    pub fn new(invoice: String, location: String) -> Self {
        Self { invoice, location }
    }
}

impl Minter for DemoMinter {
    type Challenge = Invoice;
    type Error = MintError;

    async fn mint_with_challenge(&self, request: &Parts) -> Result<(String, Invoice), MintError> {
        let preimage: [u8; BLOCK_SIZE] = rand::random();
        let identifier = Identifier::new(PaymentHash::of_preimage(&preimage), TokenId::random());

        let mut macaroon = Macaroon::new(identifier.to_bytes()?.to_vec(), [0u8; BLOCK_SIZE])
            .with_location(self.location.clone());
        if request.uri.path().starts_with("/premium") {
            macaroon = macaroon.with_caveat(Caveat::first_party(PREMIUM_TIER));
        }
        let macaroon = marshal_macaroon(&macaroon)?;

        tracing::info!(
            token_id = %identifier.id,
            preimage = %hex::encode(preimage),
            "Minted L402 macaroon"
        );
        Ok((macaroon, Invoice(self.invoice.clone())))
    }
}

/// Lets every credential through, except that `/premium` routes need the premium caveat.
#[derive(Debug, Clone, Copy)]
pub struct DemoAuthority;

impl AccessAuthority for DemoAuthority {
    async fn approve_access(&self, request: &Parts, macaroons: &MacaroonMap) -> Option<Rejection> {
        if !request.uri.path().starts_with("/premium") {
            return None;
        }
        let premium = macaroons.values().any(|macaroon| {
            macaroon
                .caveats()
                .iter()
                .any(|caveat| caveat.id == PREMIUM_TIER.as_bytes())
        });
        if premium {
            None
        } else {
            Some(Rejection::recoverable(
                "macaroon lacks the premium tier caveat",
                HeaderValue::from_static(PREMIUM_TIER),
            ))
        }
    }
}
