//! Wire encoding of the credentials carried in an `Authorization: L402` header.
//!
//! A client presents one or more macaroons as a single base64 string: the binary
//! encodings of the macaroons are concatenated and the result is base64 encoded as a
//! whole. [`unmarshal_macaroons`] turns that string into a map keyed by each macaroon's
//! [`Identifier`].
//!
//! Some clients instead base64 encode every macaroon separately and join the results
//! with commas. Decoding tolerates this on a best-effort basis: when the input is not
//! valid base64, it is split at the commas and every piece is decoded on its own. This
//! is a compatibility shim, not part of the wire contract, and [`marshal_macaroons`]
//! never produces it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use std::collections::HashMap;

use crate::identifier::{Identifier, UnknownVersion};
use crate::macaroon::{self, Macaroon, MacaroonError};

/// Verified-shape credentials of a single request, keyed by identifier.
pub type MacaroonMap = HashMap<Identifier, Macaroon>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CredentialError {
    #[error("empty credential data")]
    EmptyCredentialData,
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Macaroon(#[from] MacaroonError),
    #[error("index {index}: {source}")]
    Identifier {
        index: usize,
        #[source]
        source: UnknownVersion,
    },
    #[error("index {index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: MacaroonError,
    },
}

/// Decodes the credential part of an L402 authorization header.
///
/// Later macaroons overwrite earlier ones that carry the same identifier.
///
/// # Errors
///
/// - [`CredentialError::EmptyCredentialData`] for an empty string, or one that decodes
///   to no bytes at all (e.g. `","`).
/// - [`CredentialError::Base64`] if the input is not valid base64, neither whole nor as
///   comma-separated pieces. The error is the one produced for the whole input.
/// - [`CredentialError::Macaroon`] if the bytes are not a list of binary macaroons.
/// - [`CredentialError::Identifier`] if a macaroon does not carry a known identifier.
pub fn unmarshal_macaroons(macaroons_base64: &str) -> Result<MacaroonMap, CredentialError> {
    let bytes = decode_base64(macaroons_base64)?;
    let mut macaroons = MacaroonMap::new();
    for (index, macaroon) in macaroon::decode_all(&bytes)?.into_iter().enumerate() {
        let identifier = macaroon
            .identifier()
            .map_err(|source| CredentialError::Identifier { index, source })?;
        if let Some(_previous) = macaroons.insert(identifier, macaroon) {
            #[cfg(feature = "telemetry")]
            tracing::debug!(index, token_id = %identifier.id, "duplicate L402 identifier, keeping the later macaroon");
        }
    }
    Ok(macaroons)
}

/// Encodes macaroons into the single base64 string accepted by [`unmarshal_macaroons`].
///
/// # Errors
///
/// - [`CredentialError::EmptyCredentialData`] if `macaroons` is empty, since an empty
///   string is not a decodable credential.
/// - [`CredentialError::Encode`] naming the position of a macaroon that cannot be
///   encoded.
pub fn marshal_macaroons(macaroons: &[Macaroon]) -> Result<String, CredentialError> {
    if macaroons.is_empty() {
        return Err(CredentialError::EmptyCredentialData);
    }
    let bytes = macaroon::encode_all(macaroons)
        .map_err(|(index, source)| CredentialError::Encode { index, source })?;
    Ok(b64.encode(bytes))
}

/// Decodes a credential string that must hold exactly one macaroon.
pub fn unmarshal_macaroon(
    macaroon_base64: &str,
) -> Result<(Identifier, Macaroon), CredentialError> {
    let bytes = decode_base64(macaroon_base64)?;
    let (macaroon, rest) = Macaroon::decode(&bytes)?;
    if !rest.is_empty() {
        return Err(MacaroonError::TrailingData.into());
    }
    let identifier = macaroon
        .identifier()
        .map_err(|source| CredentialError::Identifier { index: 0, source })?;
    Ok((identifier, macaroon))
}

pub fn marshal_macaroon(macaroon: &Macaroon) -> Result<String, CredentialError> {
    marshal_macaroons(std::slice::from_ref(macaroon))
}

fn decode_base64(input: &str) -> Result<Vec<u8>, CredentialError> {
    if input.is_empty() {
        return Err(CredentialError::EmptyCredentialData);
    }
    let bytes = match b64.decode(input) {
        Ok(bytes) => bytes,
        Err(err) if input.contains(',') => {
            let mut bytes = Vec::new();
            for piece in input.split(',') {
                b64.decode_vec(piece, &mut bytes)
                    .map_err(|_| CredentialError::Base64(err.clone()))?;
            }
            bytes
        }
        Err(err) => return Err(err.into()),
    };
    if bytes.is_empty() {
        return Err(CredentialError::EmptyCredentialData);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{BLOCK_SIZE, PaymentHash, TokenId};

    const MAC1: &str = "AgJCAAABAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAgMAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAEAAAGIHqWvcIDGguzG0xeNz7kxTr4IrPg64b0EjRonYD3zkVe";
    const MAC2: &str = "AgJCAAABAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAgMAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAFAAAGIJL//w3j0KDNo5jUh+g47BAyhvsP7eiNYFHlPDw4Od/Z";
    const MAC1_MAC2: &str = "AgJCAAABAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAgMAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAEAAAGIHqWvcIDGguzG0xeNz7kxTr4IrPg64b0EjRonYD3zkVeAgJCAAABAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAgMAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAFAAAGIJL//w3j0KDNo5jUh+g47BAyhvsP7eiNYFHlPDw4Od/Z";
    // MAC1 followed by a macaroon whose id is the 3 bytes "abc"
    const MAC1_BAD_ID: &str = "AgJCAAABAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAgMAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAEAAAGIHqWvcIDGguzG0xeNz7kxTr4IrPg64b0EjRonYD3zkVeAgIDYWJjAAAGIAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn block(first: u8, last: u8) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = first;
        block[BLOCK_SIZE - 1] = last;
        block
    }

    fn identifier(last: u8) -> Identifier {
        Identifier::new(PaymentHash(block(1, 2)), TokenId(block(3, last)))
    }

    fn macaroon(base64: &str) -> Macaroon {
        unmarshal_macaroon(base64).unwrap().1
    }

    #[test]
    fn test_unmarshal_empty() {
        assert_eq!(
            unmarshal_macaroons(""),
            Err(CredentialError::EmptyCredentialData)
        );
    }

    #[test]
    fn test_unmarshal_corrupt_base64() {
        let err = unmarshal_macaroons("AGIAJEemVQUTEyNCR0exk7ek90Cg==").unwrap_err();
        assert!(matches!(err, CredentialError::Base64(_)), "{err:?}");
    }

    #[test]
    fn test_unmarshal_one() {
        let macaroons = unmarshal_macaroons(MAC1).unwrap();
        assert_eq!(macaroons.len(), 1);
        assert_eq!(macaroons.get(&identifier(4)), Some(&macaroon(MAC1)));
    }

    #[test]
    fn test_unmarshal_many() {
        let macaroons = unmarshal_macaroons(MAC1_MAC2).unwrap();
        assert_eq!(macaroons.len(), 2);
        assert_eq!(macaroons.get(&identifier(4)), Some(&macaroon(MAC1)));
        assert_eq!(macaroons.get(&identifier(5)), Some(&macaroon(MAC2)));
    }

    #[test]
    fn test_unmarshal_comma_separated() {
        let joined = format!("{MAC1},{MAC2}");
        let macaroons = unmarshal_macaroons(&joined).unwrap();
        assert_eq!(macaroons, unmarshal_macaroons(MAC1_MAC2).unwrap());
    }

    #[test]
    fn test_unmarshal_comma_separated_padded() {
        let first = marshal_macaroon(&macaroon(MAC1).with_location("xy")).unwrap();
        let second = marshal_macaroon(&macaroon(MAC2).with_location("xy")).unwrap();
        assert!(first.ends_with('=') && second.ends_with('='));

        let macaroons = unmarshal_macaroons(&format!("{first},{second}")).unwrap();
        assert_eq!(macaroons.len(), 2);
        assert_eq!(
            macaroons.get(&identifier(4)).and_then(Macaroon::location),
            Some("xy")
        );
        assert_eq!(
            macaroons.get(&identifier(5)).and_then(Macaroon::location),
            Some("xy")
        );
    }

    #[test]
    fn test_unmarshal_only_commas() {
        assert_eq!(
            unmarshal_macaroons(","),
            Err(CredentialError::EmptyCredentialData)
        );
        assert_eq!(
            unmarshal_macaroons(",,"),
            Err(CredentialError::EmptyCredentialData)
        );
    }

    #[test]
    fn test_unmarshal_comma_fallback_keeps_original_error() {
        let original = b64.decode("AGIA,JEemVQUTEyNCR0exk7ek90Cg==").unwrap_err();
        assert_eq!(
            unmarshal_macaroons("AGIA,JEemVQUTEyNCR0exk7ek90Cg=="),
            Err(CredentialError::Base64(original))
        );
    }

    #[test]
    fn test_unmarshal_truncated_list() {
        let truncated = &MAC1_MAC2[..MAC1_MAC2.len() - 40];
        assert!(unmarshal_macaroons(truncated).is_err());
    }

    #[test]
    fn test_unmarshal_reports_failing_index() {
        let err = unmarshal_macaroons(MAC1_BAD_ID).unwrap_err();
        assert_eq!(
            err,
            CredentialError::Identifier {
                index: 1,
                source: UnknownVersion(None)
            }
        );
        assert_eq!(err.to_string(), "index 1: unknown L402 version");
    }

    #[test]
    fn test_unmarshal_duplicate_keeps_last() {
        let first = macaroon(MAC1);
        let second = Macaroon::new(first.id().to_vec(), [7u8; 32]);
        let encoded = marshal_macaroons(&[first, second.clone()]).unwrap();
        let macaroons = unmarshal_macaroons(&encoded).unwrap();
        assert_eq!(macaroons.len(), 1);
        assert_eq!(macaroons.get(&identifier(4)), Some(&second));
    }

    #[test]
    fn test_marshal() {
        assert_eq!(marshal_macaroon(&macaroon(MAC1)).unwrap(), MAC1);
        assert_eq!(
            marshal_macaroons(&[macaroon(MAC1), macaroon(MAC2)]).unwrap(),
            MAC1_MAC2
        );
    }

    #[test]
    fn test_marshal_empty_is_an_error() {
        assert_eq!(
            marshal_macaroons(&[]),
            Err(CredentialError::EmptyCredentialData)
        );
    }

    #[test]
    fn test_marshal_reports_failing_index() {
        let defective = Macaroon::new(Vec::new(), Vec::new());
        let err = marshal_macaroons(&[macaroon(MAC1), defective, macaroon(MAC2)]).unwrap_err();
        assert_eq!(
            err,
            CredentialError::Encode {
                index: 1,
                source: MacaroonError::SignatureLength(0)
            }
        );
        assert_eq!(err.to_string(), "index 1: signature has unexpected length 0");
    }

    #[test]
    fn test_unmarshal_single_rejects_trailing_data() {
        assert_eq!(
            unmarshal_macaroon(MAC1_MAC2),
            Err(CredentialError::Macaroon(MacaroonError::TrailingData))
        );
    }
}
