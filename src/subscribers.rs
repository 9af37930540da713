//! The subscriber handshake: how two participants first agree on a
//! pairwise secret without any prior shared state. `add_subscriber`
//! leaves a drop in the caller's own profile tree, sealed so only the
//! named peer can open it; `test_decrypt_all_subscribers` is how a peer,
//! looking at someone else's `/subscribers` listing, finds the one drop
//! meant for them.

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use tracing::{debug, info};

use crate::contacts::{get_contacts, upsert_contact, ContactRecord};
use crate::crypto::{asym_decrypt, asym_encrypt, b64_url_decode, b64_url_encode, keyed_hash, SymmetricKey};
use crate::error::{Error, Result};
use crate::fs::ContentAddressedFs;
use crate::keys::to_canonical_public_key;
use crate::node_identity::NodeIdentity;

pub const SUBSCRIBERS_DIR: &str = "/subscribers";

/// Drop a pairwise secret for `peer` in this node's own `/subscribers`
/// directory, reusing the secret already on file in contacts if one
/// exists. Idempotent: the filename is derived from the plaintext, so
/// repeated calls with the same peer overwrite the same path.
pub async fn add_subscriber(
    fs: &dyn ContentAddressedFs,
    master_key: &SymmetricKey,
    peer_key_bytes: &[u8],
) -> Result<()> {
    let peer_cpk = to_canonical_public_key(peer_key_bytes)?;
    let peer_pub = peer_cpk.to_rsa_public_key()?;

    let contacts = get_contacts(fs, master_key).await?;
    let secret = match contacts
        .get(peer_cpk.as_pem())
        .and_then(|c| c.my_secret.as_deref())
        .map(b64_url_decode)
        .transpose()?
    {
        Some(bytes) => {
            let bytes: [u8; crate::crypto::KEY_SIZE] =
                bytes.try_into().map_err(|_| Error::Encoding("bad secret length".into()))?;
            SymmetricKey::from_bytes(bytes)
        }
        None => SymmetricKey::generate(),
    };

    upsert_contact(
        fs,
        master_key,
        peer_cpk.as_pem(),
        ContactRecord {
            my_secret: Some(b64_url_encode(secret.as_bytes())),
            extra: Default::default(),
        },
    )
    .await?;

    let plaintext = format!(
        "Hello {} : {}",
        peer_cpk.as_pem(),
        b64_url_encode(secret.as_bytes())
    );
    let hash = keyed_hash(plaintext.as_bytes());
    let ciphertext = asym_encrypt(&peer_pub, plaintext.as_bytes())?;

    let path = format!("{SUBSCRIBERS_DIR}/{hash}");
    fs.write(&path, &ciphertext, true).await?;
    info!(path = %path, "wrote subscriber drop");
    Ok(())
}

/// Trial-decrypt every entry under `subscribers_path` (normally another
/// peer's `/subscribers` listing) with this node's own private key. The
/// first entry that decrypts and starts with `Hello ` is ours; its
/// pairwise secret is returned. Concurrent trials are permitted and
/// losers are simply not waited on, not cancelled.
pub async fn test_decrypt_all_subscribers(
    fs: &dyn ContentAddressedFs,
    identity: &dyn NodeIdentity,
    subscribers_path: &str,
) -> Result<SymmetricKey> {
    let keys = identity.id().await;
    let private_key = RsaPrivateKey::from_pkcs8_pem(&keys.private_key_pkcs8_pem)
        .map_err(|_| Error::UnrecognizedKey)?;

    let entries = fs.ls(subscribers_path).await?;
    let mut trials = FuturesUnordered::new();
    for entry in entries {
        let path = format!("{subscribers_path}/{}", entry.name);
        trials.push(async move { fs.read(&path).await });
    }

    while let Some(result) = trials.next().await {
        let ciphertext = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "could not read subscriber drop candidate");
                continue;
            }
        };
        let plaintext = match asym_decrypt(&private_key, &ciphertext) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        let text = match String::from_utf8(plaintext) {
            Ok(text) => text,
            Err(_) => continue,
        };
        if !text.starts_with("Hello ") {
            continue;
        }
        let Some(tail) = text.rsplit(" : ").next() else {
            continue;
        };
        let secret_bytes = b64_url_decode(tail)?;
        let secret_bytes: [u8; crate::crypto::KEY_SIZE] = secret_bytes
            .try_into()
            .map_err(|_| Error::Encoding("bad secret length".into()))?;
        return Ok(SymmetricKey::from_bytes(secret_bytes));
    }

    Err(Error::NoDropForMe)
}
