//! Structural codec for the macaroon V2 binary format.
//!
//! This module only moves bytes. It never computes or checks signatures and never
//! evaluates caveats: those belong to whoever mints and authorizes macaroons.
//!
//! ## Layout
//!
//! ```text
//! macaroon = 0x02 header caveat* EOS signature
//! header   = [location(1)] identifier(2) EOS
//! caveat   = [location(1)] identifier(2) [verification-id(4)] EOS
//! field    = uvarint(type) uvarint(len) bytes(len)
//! EOS      = 0x00
//! ```
//!
//! Several macaroons are sent as the plain concatenation of their encodings, see
//! [`decode_all`] and [`encode_all`].

use crate::identifier::{Identifier, UnknownVersion};

/// Leading byte of every V2 binary macaroon.
pub const BINARY_V2: u8 = 2;

/// Length of a macaroon signature (HMAC-SHA256).
pub const SIGNATURE_SIZE: usize = 32;

const FIELD_EOS: u64 = 0;
const FIELD_LOCATION: u64 = 1;
const FIELD_IDENTIFIER: u64 = 2;
const FIELD_VERIFICATION_ID: u64 = 4;
const FIELD_SIGNATURE: u64 = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacaroonError {
    #[error("unsupported macaroon format version {0}")]
    UnsupportedFormat(u8),
    #[error("macaroon data truncated")]
    Truncated,
    #[error("unexpected data after macaroon")]
    TrailingData,
    #[error("macaroon field length overflows")]
    VarintOverflow,
    #[error("macaroon fields out of order")]
    FieldsOutOfOrder,
    #[error("invalid macaroon header")]
    InvalidHeader,
    #[error("no identifier in caveat")]
    CaveatWithoutIdentifier,
    #[error("location not allowed in first party caveat")]
    FirstPartyCaveatLocation,
    #[error("invalid field found in caveat")]
    InvalidCaveatField,
    #[error("unexpected field {0} found instead of signature")]
    MissingSignature(u64),
    #[error("signature has unexpected length {0}")]
    SignatureLength(usize),
    #[error("location is not valid UTF-8")]
    InvalidLocation,
}

/// A caveat attached to a macaroon.
///
/// First-party caveats carry only an id. Third-party caveats also carry a location and
/// a verification id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Caveat {
    pub location: Option<String>,
    pub id: Vec<u8>,
    pub verification_id: Option<Vec<u8>>,
}

impl Caveat {
    pub fn first_party(id: impl Into<Vec<u8>>) -> Self {
        Self {
            location: None,
            id: id.into(),
            verification_id: None,
        }
    }

    pub fn is_first_party(&self) -> bool {
        self.verification_id.is_none()
    }
}

/// A macaroon as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: Option<String>,
    id: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: Vec<u8>,
}

impl Macaroon {
    /// Assembles a macaroon from an already computed signature.
    pub fn new(id: impl Into<Vec<u8>>, signature: impl Into<Vec<u8>>) -> Self {
        Self {
            location: None,
            id: id.into(),
            caveats: Vec::new(),
            signature: signature.into(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_caveat(mut self, caveat: Caveat) -> Self {
        self.caveats.push(caveat);
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Decodes the L402 [`Identifier`] carried as this macaroon's id.
    pub fn identifier(&self) -> Result<Identifier, UnknownVersion> {
        Identifier::from_bytes(&self.id)
    }

    /// Decodes one macaroon from the front of `data` and returns the unread remainder.
    pub fn decode(data: &[u8]) -> Result<(Self, &[u8]), MacaroonError> {
        let (&format, mut data) = data.split_first().ok_or(MacaroonError::Truncated)?;
        if format != BINARY_V2 {
            return Err(MacaroonError::UnsupportedFormat(format));
        }

        let mut header = read_section(&mut data)?;
        let location = take_field(&mut header, FIELD_LOCATION)
            .map(into_location)
            .transpose()?;
        let id = take_field(&mut header, FIELD_IDENTIFIER).ok_or(MacaroonError::InvalidHeader)?;
        if !header.is_empty() {
            return Err(MacaroonError::InvalidHeader);
        }

        let mut caveats = Vec::new();
        loop {
            let mut section = read_section(&mut data)?;
            if section.is_empty() {
                break;
            }
            let location = take_field(&mut section, FIELD_LOCATION)
                .map(into_location)
                .transpose()?;
            let id = take_field(&mut section, FIELD_IDENTIFIER)
                .ok_or(MacaroonError::CaveatWithoutIdentifier)?;
            let verification_id = take_field(&mut section, FIELD_VERIFICATION_ID);
            if !section.is_empty() {
                return Err(MacaroonError::InvalidCaveatField);
            }
            if verification_id.is_none() && location.is_some() {
                return Err(MacaroonError::FirstPartyCaveatLocation);
            }
            caveats.push(Caveat {
                location,
                id,
                verification_id,
            });
        }

        let (field_type, signature) = read_field(&mut data)?;
        if field_type != FIELD_SIGNATURE {
            return Err(MacaroonError::MissingSignature(field_type));
        }
        if signature.len() != SIGNATURE_SIZE {
            return Err(MacaroonError::SignatureLength(signature.len()));
        }

        let macaroon = Self {
            location,
            id,
            caveats,
            signature: signature.to_vec(),
        };
        Ok((macaroon, data))
    }

    /// Appends the binary encoding of this macaroon to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), MacaroonError> {
        if self.signature.len() != SIGNATURE_SIZE {
            return Err(MacaroonError::SignatureLength(self.signature.len()));
        }
        out.push(BINARY_V2);
        if let Some(location) = &self.location {
            write_field(out, FIELD_LOCATION, location.as_bytes());
        }
        write_field(out, FIELD_IDENTIFIER, &self.id);
        write_varint(out, FIELD_EOS);
        for caveat in &self.caveats {
            if caveat.is_first_party() && caveat.location.is_some() {
                return Err(MacaroonError::FirstPartyCaveatLocation);
            }
            if let Some(location) = &caveat.location {
                write_field(out, FIELD_LOCATION, location.as_bytes());
            }
            write_field(out, FIELD_IDENTIFIER, &caveat.id);
            if let Some(verification_id) = &caveat.verification_id {
                write_field(out, FIELD_VERIFICATION_ID, verification_id);
            }
            write_varint(out, FIELD_EOS);
        }
        write_varint(out, FIELD_EOS);
        write_field(out, FIELD_SIGNATURE, &self.signature);
        Ok(())
    }

    pub fn to_binary(&self) -> Result<Vec<u8>, MacaroonError> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }
}

/// Decodes a concatenated list of macaroons until `data` is exhausted.
pub fn decode_all(mut data: &[u8]) -> Result<Vec<Macaroon>, MacaroonError> {
    let mut macaroons = Vec::new();
    while !data.is_empty() {
        let (macaroon, rest) = Macaroon::decode(data)?;
        macaroons.push(macaroon);
        data = rest;
    }
    Ok(macaroons)
}

/// Encodes macaroons back to back.
///
/// On failure, returns the position of the macaroon that could not be encoded.
pub fn encode_all(macaroons: &[Macaroon]) -> Result<Vec<u8>, (usize, MacaroonError)> {
    let mut out = Vec::new();
    for (index, macaroon) in macaroons.iter().enumerate() {
        macaroon
            .encode_into(&mut out)
            .map_err(|err| (index, err))?;
    }
    Ok(out)
}

fn into_location(bytes: Vec<u8>) -> Result<String, MacaroonError> {
    String::from_utf8(bytes).map_err(|_| MacaroonError::InvalidLocation)
}

/// Removes the leading field if it has the requested type.
fn take_field(section: &mut Vec<(u64, Vec<u8>)>, field_type: u64) -> Option<Vec<u8>> {
    match section.first() {
        Some((t, _)) if *t == field_type => Some(section.remove(0).1),
        _ => None,
    }
}

/// Reads fields up to and including the next EOS. Field types must strictly ascend.
fn read_section(data: &mut &[u8]) -> Result<Vec<(u64, Vec<u8>)>, MacaroonError> {
    let mut section: Vec<(u64, Vec<u8>)> = Vec::new();
    loop {
        let (field_type, payload) = read_field(data)?;
        if field_type == FIELD_EOS {
            return Ok(section);
        }
        if let Some((previous, _)) = section.last()
            && *previous >= field_type
        {
            return Err(MacaroonError::FieldsOutOfOrder);
        }
        section.push((field_type, payload.to_vec()));
    }
}

fn read_field<'a>(data: &mut &'a [u8]) -> Result<(u64, &'a [u8]), MacaroonError> {
    let field_type = read_varint(data)?;
    if field_type == FIELD_EOS {
        return Ok((FIELD_EOS, &[]));
    }
    let len = usize::try_from(read_varint(data)?).map_err(|_| MacaroonError::VarintOverflow)?;
    let bytes: &'a [u8] = data;
    if bytes.len() < len {
        return Err(MacaroonError::Truncated);
    }
    let (payload, rest) = bytes.split_at(len);
    *data = rest;
    Ok((field_type, payload))
}

fn read_varint(data: &mut &[u8]) -> Result<u64, MacaroonError> {
    let bytes: &[u8] = data;
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i >= 10 || (i == 9 && byte > 1) {
            return Err(MacaroonError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            *data = &bytes[i + 1..];
            return Ok(value);
        }
    }
    Err(MacaroonError::Truncated)
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn write_field(out: &mut Vec<u8>, field_type: u64, payload: &[u8]) {
    write_varint(out, field_type);
    write_varint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Macaroon minted by a reference V2 implementation: no location, no caveats,
    // identifier = [0,0 | 1,0..0,2 | 3,0..0,4].
    const MAC1_HEX: &str = "020242000001000000000000000000000000000000000000000000000000000000000000020300000000000000000000000000000000000000000000000000000000000004000006207a96bdc2031a0bb31b4c5e373ee4c53af822b3e0eb86f41234689d80f7ce455e";

    fn mac1() -> Vec<u8> {
        hex::decode(MAC1_HEX).unwrap()
    }

    #[test]
    fn test_decode_reference_macaroon() {
        let bytes = mac1();
        let (macaroon, rest) = Macaroon::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(macaroon.location(), None);
        assert_eq!(macaroon.id().len(), 66);
        assert!(macaroon.caveats().is_empty());
        assert_eq!(
            hex::encode(macaroon.signature()),
            "7a96bdc2031a0bb31b4c5e373ee4c53af822b3e0eb86f41234689d80f7ce455e"
        );
        let identifier = macaroon.identifier().unwrap();
        assert_eq!(identifier.payment_hash.0[0], 1);
        assert_eq!(identifier.payment_hash.0[31], 2);
        assert_eq!(identifier.id.0[0], 3);
        assert_eq!(identifier.id.0[31], 4);
    }

    #[test]
    fn test_encode_matches_reference_bytes() {
        let bytes = mac1();
        let (macaroon, _) = Macaroon::decode(&bytes).unwrap();
        assert_eq!(macaroon.to_binary().unwrap(), bytes);
    }

    #[test]
    fn test_caveats_and_location_survive_encoding() {
        let macaroon = Macaroon::new(b"some id".to_vec(), [9u8; SIGNATURE_SIZE])
            .with_location("https://example.com")
            .with_caveat(Caveat::first_party("tier = premium"))
            .with_caveat(Caveat {
                location: Some("https://auth.example.com".into()),
                id: b"third party".to_vec(),
                verification_id: Some(vec![7; 48]),
            });
        let bytes = macaroon.to_binary().unwrap();
        let (decoded, rest) = Macaroon::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, macaroon);
        assert!(decoded.caveats()[0].is_first_party());
        assert!(!decoded.caveats()[1].is_first_party());
    }

    #[test]
    fn test_decode_all_concatenated() {
        let mut bytes = mac1();
        bytes.extend(mac1());
        let macaroons = decode_all(&bytes).unwrap();
        assert_eq!(macaroons.len(), 2);
        assert_eq!(macaroons[0], macaroons[1]);
        assert!(decode_all(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Macaroon::decode(&[]), Err(MacaroonError::Truncated));
        assert_eq!(
            Macaroon::decode(b"MDAw"),
            Err(MacaroonError::UnsupportedFormat(b'M'))
        );

        let bytes = mac1();
        assert_eq!(
            Macaroon::decode(&bytes[..bytes.len() - 1]),
            Err(MacaroonError::Truncated)
        );

        // identifier before location
        let out_of_order = [BINARY_V2, 2, 1, b'a', 1, 1, b'b', 0];
        assert_eq!(
            Macaroon::decode(&out_of_order),
            Err(MacaroonError::FieldsOutOfOrder)
        );

        // header without identifier
        let no_id = [BINARY_V2, 1, 1, b'a', 0];
        assert_eq!(Macaroon::decode(&no_id), Err(MacaroonError::InvalidHeader));

        // short signature
        let short_sig = [BINARY_V2, 2, 1, b'a', 0, 0, 6, 1, 0];
        assert_eq!(
            Macaroon::decode(&short_sig),
            Err(MacaroonError::SignatureLength(1))
        );
    }

    #[test]
    fn test_encode_rejects_bad_signature() {
        let macaroon = Macaroon::new(b"id".to_vec(), Vec::new());
        assert_eq!(macaroon.to_binary(), Err(MacaroonError::SignatureLength(0)));

        let good = Macaroon::new(b"id".to_vec(), [0u8; SIGNATURE_SIZE]);
        assert_eq!(
            encode_all(&[good.clone(), macaroon, good]),
            Err((1, MacaroonError::SignatureLength(0)))
        );
    }

    #[test]
    fn test_varint_round_trip_boundaries() {
        for value in [0, 1, 127, 128, 300, 16_384, u64::MAX] {
            let mut out = Vec::new();
            write_varint(&mut out, value);
            let mut slice = out.as_slice();
            assert_eq!(read_varint(&mut slice).unwrap(), value);
            assert!(slice.is_empty());
        }
    }
}
