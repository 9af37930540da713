//! In-memory implementations of the external collaborator traits, shared
//! by this crate's own unit tests and by `tests/e2e.rs`. None of this is
//! feature-gated: a working in-process profile tree and identity are
//! useful any time a caller doesn't have a real filesystem node handy,
//! not just in test builds.

use async_trait::async_trait;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::node_identity::{IdentityKeys, NodeIdentity};
use crate::publisher::NameResolver;

/// A fixed RSA identity, generated once and held for the collaborator's
/// lifetime.
pub struct StaticIdentity {
    private_key_pkcs8_pem: String,
    public_key_pem: String,
}

impl StaticIdentity {
    pub fn generate() -> Self {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
            .expect("RSA key generation should not fail for a fixed modulus size");
        let public = RsaPublicKey::from(&private);
        Self {
            private_key_pkcs8_pem: private
                .to_pkcs8_pem(LineEnding::LF)
                .expect("pkcs8 encoding of a freshly generated key cannot fail")
                .to_string(),
            public_key_pem: public
                .to_public_key_pem(LineEnding::LF)
                .expect("pkcs8 encoding of a freshly generated key cannot fail"),
        }
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }
}

#[async_trait]
impl NodeIdentity for StaticIdentity {
    async fn id(&self) -> IdentityKeys {
        IdentityKeys {
            public_key: self.public_key_pem.clone().into_bytes(),
            private_key_pkcs8_pem: self.private_key_pkcs8_pem.clone(),
        }
    }
}

pub fn test_identity() -> StaticIdentity {
    StaticIdentity::generate()
}

/// A `NameResolver` that always falls through to the configured fallback
/// hash (see `publisher.rs`, Open Question (i)).
#[derive(Default)]
pub struct NullNameResolver;

#[async_trait]
impl NameResolver for NullNameResolver {
    async fn resolve_peer_root(&self, _cpk_pem: &str) -> Option<String> {
        None
    }
}
