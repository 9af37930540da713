//! Cryptographic primitives: symmetric AEAD for the master key / pairwise
//! secrets / group keys, RSA-OAEP for subscriber drops, content-addressed
//! hashing, and URL-safe base64.
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | AES-256-GCM | master key, pairwise secret, group key encryption |
//! | RSA-OAEP (SHA-256) | subscriber drop sealing |
//! | SHA-256 (multihash) | content-addressed filenames |

mod aead;
mod asym;
mod encoding;
mod hash;

pub use aead::{sym_decrypt, sym_encrypt, SymmetricKey, KEY_SIZE, NONCE_SIZE};
pub use asym::{asym_decrypt, asym_encrypt};
pub use encoding::{b64_url_decode, b64_url_encode};
pub use hash::keyed_hash;
