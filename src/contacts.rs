//! The contacts registry: peers this node has exchanged pairwise secrets
//! with, keyed by canonical public key rather than by any transport-level
//! identifier. Stored as one JSON document, encrypted under the master
//! key, at `/private/contacts.json.enc`. Grow-only in practice — nothing
//! in this crate removes a contact.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{sym_decrypt, sym_encrypt, SymmetricKey};
use crate::error::Result;
use crate::fs::ContentAddressedFs;

pub const CONTACTS_PATH: &str = "/private/contacts.json.enc";

/// A single contact's attributes. `my_secret` is `S(self -> peer)`, the
/// pairwise secret this node uses to talk to that peer; other attributes
/// a caller wants to persist alongside it pass through untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContactRecord {
    #[serde(rename = "my-secret", skip_serializing_if = "Option::is_none")]
    pub my_secret: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

pub type Contacts = HashMap<String, ContactRecord>;

/// Returns an empty map if `contacts.json.enc` doesn't exist yet.
pub async fn get_contacts(
    fs: &dyn ContentAddressedFs,
    master_key: &SymmetricKey,
) -> Result<Contacts> {
    match fs.read(CONTACTS_PATH).await {
        Ok(blob) => {
            let plaintext = sym_decrypt(master_key, &blob)?;
            Ok(serde_json::from_slice(&plaintext)?)
        }
        Err(e) if e.is_path_missing() => Ok(Contacts::new()),
        Err(e) => Err(e),
    }
}

/// Merges `update` into the contact filed under `cpk`, re-encrypts the
/// whole registry, and rewrites it. `update.my_secret` overwrites the
/// stored secret only if `Some`; `update.extra` entries overwrite by key.
pub async fn upsert_contact(
    fs: &dyn ContentAddressedFs,
    master_key: &SymmetricKey,
    cpk: &str,
    update: ContactRecord,
) -> Result<()> {
    let mut contacts = get_contacts(fs, master_key).await?;
    let entry = contacts.entry(cpk.to_string()).or_default();
    if update.my_secret.is_some() {
        entry.my_secret = update.my_secret;
    }
    entry.extra.extend(update.extra);

    let plaintext = serde_json::to_vec(&contacts)?;
    let blob = sym_encrypt(master_key, &plaintext)?;
    fs.write(CONTACTS_PATH, &blob, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    #[tokio::test]
    async fn empty_when_absent() {
        let fs = InMemoryFs::new();
        let key = SymmetricKey::generate();
        let contacts = get_contacts(&fs, &key).await.unwrap();
        assert!(contacts.is_empty());
    }

    #[tokio::test]
    async fn upsert_then_read_round_trips() {
        let fs = InMemoryFs::new();
        let key = SymmetricKey::generate();
        let record = ContactRecord {
            my_secret: Some("c2VjcmV0".into()),
            extra: HashMap::new(),
        };
        upsert_contact(&fs, &key, "peer-cpk", record).await.unwrap();

        let contacts = get_contacts(&fs, &key).await.unwrap();
        assert_eq!(
            contacts.get("peer-cpk").unwrap().my_secret.as_deref(),
            Some("c2VjcmV0")
        );
    }

    #[tokio::test]
    async fn upsert_merges_rather_than_replaces() {
        let fs = InMemoryFs::new();
        let key = SymmetricKey::generate();
        upsert_contact(
            &fs,
            &key,
            "peer-cpk",
            ContactRecord {
                my_secret: Some("first".into()),
                extra: HashMap::new(),
            },
        )
        .await
        .unwrap();

        let mut extra = HashMap::new();
        extra.insert("nickname".to_string(), serde_json::json!("Alice"));
        upsert_contact(
            &fs,
            &key,
            "peer-cpk",
            ContactRecord {
                my_secret: None,
                extra,
            },
        )
        .await
        .unwrap();

        let contacts = get_contacts(&fs, &key).await.unwrap();
        let entry = contacts.get("peer-cpk").unwrap();
        assert_eq!(entry.my_secret.as_deref(), Some("first"));
        assert_eq!(entry.extra.get("nickname").unwrap(), "Alice");
    }
}
