//! Symmetric encryption for the master key, pairwise secrets, and group
//! keys. All three share one AEAD scheme and one blob format: a random
//! nonce followed by the ciphertext-with-tag, concatenated into a single
//! byte string so callers never juggle nonce and ciphertext separately.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

pub const NONCE_SIZE: usize = 12;
pub const KEY_SIZE: usize = 32;
const TAG_SIZE: usize = 16;

/// A 256-bit AEAD key. Used for the master key, a pairwise secret, and a
/// group key alike — all three are keys of this same shape.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Encrypt `plaintext` under `key`, returning `nonce ‖ ciphertext+tag`.
pub fn sym_encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|_| Error::AuthFailed)?;
    let payload = Payload {
        msg: plaintext,
        aad: &[],
    };
    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&nonce_bytes), payload)
        .map_err(|_| Error::AuthFailed)?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a `nonce ‖ ciphertext+tag` blob under `key`.
///
/// Returns `ShortMessage` if the blob is too short to contain a nonce and
/// a tag, `AuthFailed` on any tamper or wrong-key condition. Never returns
/// a plaintext that didn't authenticate.
pub fn sym_decrypt(key: &SymmetricKey, blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::ShortMessage);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);

    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|_| Error::AuthFailed)?;
    let payload = Payload {
        msg: ciphertext,
        aad: &[],
    };
    cipher
        .decrypt(AesNonce::from_slice(nonce_bytes), payload)
        .map_err(|_| Error::AuthFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = SymmetricKey::generate();
        let blob = sym_encrypt(&key, b"hello gravity").unwrap();
        let plaintext = sym_decrypt(&key, &blob).unwrap();
        assert_eq!(plaintext, b"hello gravity");
    }

    #[test]
    fn wrong_key_fails_closed() {
        let key = SymmetricKey::generate();
        let other = SymmetricKey::generate();
        let blob = sym_encrypt(&key, b"secret").unwrap();
        assert!(matches!(sym_decrypt(&other, &blob), Err(Error::AuthFailed)));
    }

    #[test]
    fn short_blob_is_rejected_before_decryption() {
        let key = SymmetricKey::generate();
        let err = sym_decrypt(&key, &[0u8; 3]).unwrap_err();
        assert!(matches!(err, Error::ShortMessage));
    }

    #[test]
    fn blob_with_full_nonce_but_no_tag_is_still_short_message() {
        let key = SymmetricKey::generate();
        let err = sym_decrypt(&key, &[0u8; NONCE_SIZE]).unwrap_err();
        assert!(matches!(err, Error::ShortMessage));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = SymmetricKey::generate();
        let mut blob = sym_encrypt(&key, b"hello gravity").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(sym_decrypt(&key, &blob), Err(Error::AuthFailed)));
    }

    #[test]
    fn different_calls_use_different_nonces() {
        let key = SymmetricKey::generate();
        let a = sym_encrypt(&key, b"same plaintext").unwrap();
        let b = sym_encrypt(&key, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}
