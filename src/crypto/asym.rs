//! Asymmetric encryption for subscriber drops. A peer's canonical public
//! key seals a pairwise secret; only the holder of the matching private
//! key can recover it. Failure is always reported as `AuthFailed` — never
//! as a plaintext that merely looks wrong.

use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{Error, Result};

pub fn asym_encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let padding = Oaep::new::<Sha256>();
    public_key
        .encrypt(&mut rand::rngs::OsRng, padding, plaintext)
        .map_err(|_| Error::AuthFailed)
}

pub fn asym_decrypt(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let padding = Oaep::new::<Sha256>();
    private_key
        .decrypt(padding, ciphertext)
        .map_err(|_| Error::AuthFailed)
}
