//! The node's own identity is an external collaborator: the underlying
//! asymmetric key pair is owned by the filesystem node, not by this
//! crate. All this crate needs from it is the pair's raw bytes, in
//! whatever form the node exposes them — `to_canonical_public_key`
//! normalizes the public half.

use async_trait::async_trait;

/// The node identity's key material, as handed back by `NodeIdentity::id`.
pub struct IdentityKeys {
    /// The public key in any form `to_canonical_public_key` recognizes.
    pub public_key: Vec<u8>,
    /// The private key, in the node's own DER/PEM encoding, suitable for
    /// `rsa::RsaPrivateKey::from_pkcs8_pem`/`from_pkcs1_der`.
    pub private_key_pkcs8_pem: String,
}

/// The underlying node identity collaborator. Implemented by the host
/// application; this crate never generates or stores this key pair.
#[async_trait]
pub trait NodeIdentity: Send + Sync {
    async fn id(&self) -> IdentityKeys;
}
