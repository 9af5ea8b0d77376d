//! Binary envelope framing for stored config rows.
//!
//! Every persisted value is `marker || fingerprint || payload`: a two-byte
//! format marker, the eight-byte fingerprint the schema registry assigned to
//! the writer's schema, then the schema-encoded payload. Rows written years
//! apart under different schema versions all decode through the same path by
//! resolving the fingerprint back to the writer's schema.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::EnvelopeError;

/// Two-byte marker identifying the envelope format version.
pub const ENVELOPE_MARKER: [u8; 2] = [0xc3, 0x01];

/// Marker plus fingerprint; the minimum length of any stored value.
pub const ENVELOPE_HEADER_LEN: usize = 10;

/// Eight-byte schema identifier assigned by the schema registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 8]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Encoding used in registry URLs and responses.
    pub fn to_base64(self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Parse the registry's base64 transport form; `None` if the input does
    /// not decode to exactly eight bytes.
    pub fn from_base64(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        let bytes: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl From<[u8; 8]> for Fingerprint {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// A parsed envelope borrowing the payload from the stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub fingerprint: Fingerprint,
    pub payload: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Split stored bytes into fingerprint and payload.
    ///
    /// A wrong marker means the row was written by something that is not
    /// this store (or corrupted); too few bytes means the row was torn.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() >= ENVELOPE_MARKER.len() && bytes[..2] != ENVELOPE_MARKER {
            return Err(EnvelopeError::MarkerMismatch {
                got: bytes[..2].to_vec(),
            });
        }
        if bytes.len() < ENVELOPE_HEADER_LEN {
            return Err(EnvelopeError::Truncated {
                needed: ENVELOPE_HEADER_LEN,
                got: bytes.len(),
            });
        }
        let mut fingerprint = [0u8; 8];
        fingerprint.copy_from_slice(&bytes[2..ENVELOPE_HEADER_LEN]);
        Ok(Self {
            fingerprint: Fingerprint(fingerprint),
            payload: &bytes[ENVELOPE_HEADER_LEN..],
        })
    }
}

/// Frame a payload with the marker and the writer's fingerprint.
pub fn seal(fingerprint: Fingerprint, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
    out.extend_from_slice(&ENVELOPE_MARKER);
    out.extend_from_slice(fingerprint.as_bytes());
    out.extend_from_slice(payload);
    out
}
