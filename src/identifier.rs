//! Fixed-size binary identifier embedded in every L402 macaroon.
//!
//! An [`Identifier`] ties a macaroon to the payment that unlocked it. Its wire form is
//! exactly [`IDENTIFIER_SIZE`] bytes:
//!
//! ```text
//! [u16 big-endian version][32-byte payment hash][32-byte token id]
//! ```
//!
//! Only version `0` exists. Any other version is rejected both when encoding and when
//! decoding.
//!
//! ## Example
//!
//! ```rust
//! use l402_rs::identifier::{Identifier, PaymentHash, TokenId};
//!
//! let identifier = Identifier::new(PaymentHash::of_preimage(&[0u8; 32]), TokenId::random());
//! let bytes = identifier.to_bytes().unwrap();
//! assert_eq!(Identifier::from_bytes(&bytes).unwrap(), identifier);
//! ```

use sha2::{Digest, Sha256};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Size of the payment hash and of the token id, equal to the SHA-256 output size.
pub const BLOCK_SIZE: usize = 32;

/// The only identifier version understood by this crate.
pub const IDENTIFIER_VERSION: u16 = 0;

const VERSION_SIZE: usize = size_of::<u16>();
const PAYMENT_HASH_OFFSET: usize = VERSION_SIZE;
const TOKEN_ID_OFFSET: usize = PAYMENT_HASH_OFFSET + BLOCK_SIZE;

/// Size of a binary encoded [`Identifier`].
pub const IDENTIFIER_SIZE: usize = TOKEN_ID_OFFSET + BLOCK_SIZE;

/// The identifier is not a version this crate understands.
///
/// Carries the offending version when one could be read. `None` means the input did not
/// even have the length of a known layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown L402 version{}", display_version(.0))]
pub struct UnknownVersion(pub Option<u16>);

fn display_version(version: &Option<u16>) -> String {
    match version {
        Some(version) => format!(": {version}"),
        None => String::new(),
    }
}

/// Error returned when parsing a hex encoded block.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid 32-byte hex block: {0}")]
pub struct InvalidHexBlock(#[from] hex::FromHexError);

macro_rules! byte_block {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub [u8; BLOCK_SIZE]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
                &self.0
            }
        }

        impl From<[u8; BLOCK_SIZE]> for $name {
            fn from(bytes: [u8; BLOCK_SIZE]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = InvalidHexBlock;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; BLOCK_SIZE];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }
    };
}

byte_block!(
    /// SHA-256 hash of the payment preimage.
    PaymentHash
);

byte_block!(
    /// Opaque token id, unique per minted macaroon.
    TokenId
);

impl PaymentHash {
    /// Hashes a preimage. A client proves payment by presenting a preimage whose hash
    /// equals the payment hash embedded in its macaroon.
    pub fn of_preimage(preimage: &[u8; BLOCK_SIZE]) -> Self {
        Self(Sha256::digest(preimage).into())
    }
}

impl TokenId {
    /// Draws a fresh random token id.
    pub fn random() -> Self {
        Self(rand::random())
    }
}

/// Identifier of an L402 macaroon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub version: u16,
    pub payment_hash: PaymentHash,
    pub id: TokenId,
}

impl Identifier {
    /// Builds a version `0` identifier.
    pub fn new(payment_hash: PaymentHash, id: TokenId) -> Self {
        Self {
            version: IDENTIFIER_VERSION,
            payment_hash,
            id,
        }
    }

    /// Encodes the identifier into its [`IDENTIFIER_SIZE`] byte wire form.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVersion`] if `version` is not `0`.
    pub fn to_bytes(&self) -> Result<[u8; IDENTIFIER_SIZE], UnknownVersion> {
        if self.version != IDENTIFIER_VERSION {
            return Err(UnknownVersion(Some(self.version)));
        }
        let mut bytes = [0u8; IDENTIFIER_SIZE];
        bytes[..PAYMENT_HASH_OFFSET].copy_from_slice(&self.version.to_be_bytes());
        bytes[PAYMENT_HASH_OFFSET..TOKEN_ID_OFFSET].copy_from_slice(&self.payment_hash.0);
        bytes[TOKEN_ID_OFFSET..].copy_from_slice(&self.id.0);
        Ok(bytes)
    }

    /// Decodes an identifier from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVersion`] if the input is not exactly [`IDENTIFIER_SIZE`] bytes
    /// long, or if its leading version field is not `0`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UnknownVersion> {
        let bytes: &[u8; IDENTIFIER_SIZE] = bytes.try_into().map_err(|_| UnknownVersion(None))?;

        let version = u16::from_be_bytes([bytes[0], bytes[1]]);
        if version != IDENTIFIER_VERSION {
            return Err(UnknownVersion(Some(version)));
        }

        let mut payment_hash = [0u8; BLOCK_SIZE];
        payment_hash.copy_from_slice(&bytes[PAYMENT_HASH_OFFSET..TOKEN_ID_OFFSET]);
        let mut id = [0u8; BLOCK_SIZE];
        id.copy_from_slice(&bytes[TOKEN_ID_OFFSET..]);

        Ok(Self::new(PaymentHash(payment_hash), TokenId(id)))
    }
}

impl TryFrom<&[u8]> for Identifier {
    type Error = UnknownVersion;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}
