//! Canonical public key normalization.
//!
//! Every component in this crate keys its data by a single reference
//! form of a peer's public key: a PEM-framed pkcs8 `RsaPublicKey`. Peers
//! can present their key two ways — already in that form, or as the
//! length-prefixed protobuf envelope a content-addressed filesystem
//! node's identity subsystem hands out (`{Type, Data}`, `Data` holding a
//! PKCS#1 DER-encoded RSA public key). `to_canonical_public_key` accepts
//! either and always produces the same reference form.
//!
//! Recognizers are tried in order. Each recognizer's `matches` is a total
//! predicate over the input shape (it never panics and never does real
//! parsing work) so that a failed `convert` after a `matches` hit is a
//! genuine parse error rather than evidence the wrong recognizer ran.
//! `UnrecognizedKey` is returned only once every recognizer's `matches`
//! has failed.

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::RsaPublicKey;

use crate::error::{Error, Result};

/// A public key in its single reference form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalPublicKey(String);

impl CanonicalPublicKey {
    pub fn as_pem(&self) -> &str {
        &self.0
    }

    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey> {
        RsaPublicKey::from_public_key_pem(&self.0).map_err(|_| Error::UnrecognizedKey)
    }

    pub fn from_rsa_public_key(key: &RsaPublicKey) -> Result<Self> {
        let pem = key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|_| Error::UnrecognizedKey)?;
        Ok(Self(pem))
    }
}

impl std::fmt::Display for CanonicalPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

trait KeyRecognizer {
    fn matches(&self, input: &[u8]) -> bool;
    fn convert(&self, input: &[u8]) -> Result<CanonicalPublicKey>;
}

struct PemPkcs8;

impl KeyRecognizer for PemPkcs8 {
    fn matches(&self, input: &[u8]) -> bool {
        std::str::from_utf8(input)
            .map(|s| s.contains("-----BEGIN PUBLIC KEY-----"))
            .unwrap_or(false)
    }

    fn convert(&self, input: &[u8]) -> Result<CanonicalPublicKey> {
        let pem = std::str::from_utf8(input).map_err(|_| Error::UnrecognizedKey)?;
        let key = RsaPublicKey::from_public_key_pem(pem).map_err(|_| Error::UnrecognizedKey)?;
        CanonicalPublicKey::from_rsa_public_key(&key)
    }
}

/// Length-prefixed protobuf envelope: a one-byte varint field tag (`0x08`)
/// and key-type value, then a field tag (`0x12`) and a varint length
/// introducing the DER-encoded RSA public key.
struct ProtobufFramed;

impl ProtobufFramed {
    fn read_varint(input: &[u8]) -> Option<(u64, usize)> {
        let mut value: u64 = 0;
        let mut shift = 0;
        for (i, byte) in input.iter().enumerate() {
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Some((value, i + 1));
            }
            shift += 7;
            if shift > 63 {
                return None;
            }
        }
        None
    }
}

impl KeyRecognizer for ProtobufFramed {
    fn matches(&self, input: &[u8]) -> bool {
        input.len() > 4 && input[0] == 0x08 && input.get(2) == Some(&0x12)
    }

    fn convert(&self, input: &[u8]) -> Result<CanonicalPublicKey> {
        let length_field = &input[3..];
        let (length, consumed) =
            Self::read_varint(length_field).ok_or(Error::UnrecognizedKey)?;
        let data_start = 3 + consumed;
        let data_end = data_start
            .checked_add(length as usize)
            .ok_or(Error::UnrecognizedKey)?;
        let der = input.get(data_start..data_end).ok_or(Error::UnrecognizedKey)?;
        let key = RsaPublicKey::from_pkcs1_der(der).map_err(|_| Error::UnrecognizedKey)?;
        CanonicalPublicKey::from_rsa_public_key(&key)
    }
}

fn recognizers() -> Vec<Box<dyn KeyRecognizer>> {
    vec![Box::new(PemPkcs8), Box::new(ProtobufFramed)]
}

/// Normalize any recognized public key representation into its canonical
/// reference form. Total over its recognized inputs, and idempotent:
/// passing an already-canonical PEM back in yields the same PEM.
pub fn to_canonical_public_key(input: &[u8]) -> Result<CanonicalPublicKey> {
    for recognizer in recognizers() {
        if recognizer.matches(input) {
            return recognizer.convert(input);
        }
    }
    Err(Error::UnrecognizedKey)
}
