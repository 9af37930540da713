//! The group engine: bundling several pairwise relationships into one
//! named group with a single symmetric key, a roster of nicknames, and a
//! per-member directory entry so each member can recover the group key
//! without anyone else's help.

use std::collections::HashMap;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::contacts::get_contacts;
use crate::crypto::{
    b64_url_decode, b64_url_encode, keyed_hash, sym_decrypt, sym_encrypt, SymmetricKey,
};
use crate::error::{Error, Result};
use crate::fs::ContentAddressedFs;
use crate::keys::CanonicalPublicKey;

pub const GROUPS_DIR: &str = "/groups";
const SELF_MEMBER_FILENAME: &str = "me";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    #[serde(default)]
    pub members: HashMap<String, String>,
}

/// `sym_encrypt`/`sym_decrypt` carry a group key as a single-element JSON
/// list, `[base64(key)]`, per the data model. A dedicated newtype keeps
/// the `serde_json::to_vec`/`from_slice` calls symmetric with the rest of
/// this module instead of hand-building bracket syntax.
#[derive(Serialize, Deserialize)]
struct KeyEnvelope(Vec<String>);

fn group_dir(group_salt_b64: &str) -> String {
    format!("{GROUPS_DIR}/{group_salt_b64}")
}

fn member_filename(group_salt: &[u8], pairwise_secret: &SymmetricKey) -> String {
    let mut input = Vec::with_capacity(group_salt.len() + crate::crypto::KEY_SIZE);
    input.extend_from_slice(group_salt);
    input.extend_from_slice(pairwise_secret.as_bytes());
    keyed_hash(&input)
}

/// Create a group containing `self_cpk` and every CPK in `members`.
///
/// Validates that every member has a contacts entry (and therefore a
/// pairwise secret on file) before any write happens; on `UnknownMember`
/// the `/groups` tree is left exactly as it was found. On success,
/// per-member key deliveries and the group info document are written
/// (parallelized among themselves), then nicknames are seeded — strictly
/// after every prior write has been awaited. Returns `b64url(group_salt)`.
pub async fn create_group(
    fs: &dyn ContentAddressedFs,
    master_key: &SymmetricKey,
    self_cpk: &CanonicalPublicKey,
    members: &[CanonicalPublicKey],
    group_id: Option<String>,
) -> Result<String> {
    let contacts = get_contacts(fs, master_key).await?;

    let mut unknown = Vec::new();
    let mut member_secrets = Vec::new();
    for member in members {
        match contacts
            .get(member.as_pem())
            .and_then(|c| c.my_secret.as_deref())
        {
            Some(secret_b64) => {
                let bytes = b64_url_decode(secret_b64)?;
                let bytes: [u8; crate::crypto::KEY_SIZE] = bytes
                    .try_into()
                    .map_err(|_| Error::Encoding("bad secret length".into()))?;
                member_secrets.push((member.clone(), SymmetricKey::from_bytes(bytes)));
            }
            None => unknown.push(member.as_pem().to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(Error::UnknownMember(unknown));
    }

    let mut group_salt = [0u8; crate::crypto::NONCE_SIZE];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut group_salt);
    let group_key = SymmetricKey::generate();
    let dir = group_dir(&b64_url_encode(&group_salt));

    fs.mkdir(&dir, true).await?;

    let mut deliveries: Vec<futures::future::BoxFuture<'_, Result<()>>> =
        Vec::with_capacity(member_secrets.len() + 2);
    for (_, secret) in &member_secrets {
        let filename = member_filename(&group_salt, secret);
        let payload = serde_json::to_vec(&KeyEnvelope(vec![b64_url_encode(group_key.as_bytes())]))?;
        let blob = sym_encrypt(secret, &payload)?;
        let path = format!("{dir}/{filename}");
        deliveries.push(Box::pin(async move { fs.write(&path, &blob, true).await }));
    }

    let self_payload = serde_json::to_vec(&KeyEnvelope(vec![b64_url_encode(group_key.as_bytes())]))?;
    let self_blob = sym_encrypt(master_key, &self_payload)?;
    let self_path = format!("{dir}/{SELF_MEMBER_FILENAME}");
    deliveries.push(Box::pin(async move {
        fs.write(&self_path, &self_blob, true).await
    }));

    let info = GroupInfo {
        id: group_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        members: HashMap::new(),
    };
    let info_plaintext = serde_json::to_vec(&info)?;
    let info_blob = sym_encrypt(&group_key, &info_plaintext)?;
    let info_path = format!("{dir}/info.json.enc");
    deliveries.push(Box::pin(async move {
        fs.write(&info_path, &info_blob, true).await
    }));

    try_join_all(deliveries).await?;

    // Nicknames are seeded strictly after every key delivery and the
    // group info document have been written and awaited.
    let group_b64 = b64_url_encode(&group_salt);
    let all_members: Vec<CanonicalPublicKey> = std::iter::once(self_cpk.clone())
        .chain(members.iter().cloned())
        .collect();
    let empty_nicknames: HashMap<CanonicalPublicKey, String> = all_members
        .into_iter()
        .map(|cpk| (cpk, String::new()))
        .collect();
    set_nicknames(fs, master_key, self_cpk, &group_b64, empty_nicknames).await?;

    info!(group = %group_b64, members = member_secrets.len(), "created group");
    Ok(group_b64)
}

/// Recover the group key for `group_b64`, as either the self member
/// (under the master key) or a regular member (under the pairwise
/// secret derived filename).
pub async fn get_group_key(
    fs: &dyn ContentAddressedFs,
    master_key: &SymmetricKey,
    group_b64: &str,
) -> Result<SymmetricKey> {
    let dir = group_dir(group_b64);
    let path = format!("{dir}/{SELF_MEMBER_FILENAME}");
    let blob = fs.read(&path).await?;
    let plaintext = sym_decrypt(master_key, &blob)?;
    parse_bracketed_key(&plaintext)
}

/// Recover the group key via a known pairwise secret and group salt,
/// for a non-self member.
pub async fn get_group_key_as_member(
    fs: &dyn ContentAddressedFs,
    group_salt: &[u8],
    pairwise_secret: &SymmetricKey,
) -> Result<SymmetricKey> {
    let group_b64 = b64_url_encode(group_salt);
    let dir = group_dir(&group_b64);
    let filename = member_filename(group_salt, pairwise_secret);
    let path = format!("{dir}/{filename}");
    let blob = fs.read(&path).await?;
    let plaintext = sym_decrypt(pairwise_secret, &blob)?;
    parse_bracketed_key(&plaintext)
}

fn parse_bracketed_key(plaintext: &[u8]) -> Result<SymmetricKey> {
    let envelope: KeyEnvelope = serde_json::from_slice(plaintext)?;
    let encoded = envelope
        .0
        .first()
        .ok_or_else(|| Error::Encoding("empty group key payload".into()))?;
    let bytes = b64_url_decode(encoded)?;
    let bytes: [u8; crate::crypto::KEY_SIZE] =
        bytes.try_into().map_err(|_| Error::Encoding("bad key length".into()))?;
    Ok(SymmetricKey::from_bytes(bytes))
}

/// Returns an empty `GroupInfo` if `info.json.enc` is missing.
pub async fn get_group_info(
    fs: &dyn ContentAddressedFs,
    group_key: &SymmetricKey,
    group_b64: &str,
) -> Result<GroupInfo> {
    let path = format!("{}/info.json.enc", group_dir(group_b64));
    match fs.read(&path).await {
        Ok(blob) => {
            let plaintext = sym_decrypt(group_key, &blob)?;
            Ok(serde_json::from_slice(&plaintext)?)
        }
        Err(e) if e.is_path_missing() => Ok(GroupInfo::default()),
        Err(e) => Err(e),
    }
}

/// Set nicknames for every member in `nicknames`. Validates that every
/// target CPK already has a member filename in the group — derived from
/// its pairwise secret on file in contacts, or `me` for `self_cpk` —
/// before making any change; on `NotInGroup` no update happens.
pub async fn set_nicknames(
    fs: &dyn ContentAddressedFs,
    master_key: &SymmetricKey,
    self_cpk: &CanonicalPublicKey,
    group_b64: &str,
    nicknames: HashMap<CanonicalPublicKey, String>,
) -> Result<()> {
    let dir = group_dir(group_b64);
    let group_salt = b64_url_decode(group_b64)?;
    let entries = fs.ls(&dir).await?;
    let existing_filenames: std::collections::HashSet<String> =
        entries.into_iter().map(|e| e.name).collect();
    let contacts = get_contacts(fs, master_key).await?;

    let mut not_in_group = Vec::new();
    for cpk in nicknames.keys() {
        let expected_filename = if cpk.as_pem() == self_cpk.as_pem() {
            Some(SELF_MEMBER_FILENAME.to_string())
        } else {
            contacts
                .get(cpk.as_pem())
                .and_then(|c| c.my_secret.as_deref())
                .and_then(|secret_b64| b64_url_decode(secret_b64).ok())
                .and_then(|bytes| <[u8; crate::crypto::KEY_SIZE]>::try_from(bytes).ok())
                .map(|bytes| member_filename(&group_salt, &SymmetricKey::from_bytes(bytes)))
        };
        match expected_filename {
            Some(filename) if existing_filenames.contains(&filename) => {}
            _ => not_in_group.push(cpk.as_pem().to_string()),
        }
    }
    if !not_in_group.is_empty() {
        return Err(Error::NotInGroup(not_in_group));
    }

    let group_key = get_group_key(fs, master_key, group_b64).await?;
    let mut info = get_group_info(fs, &group_key, group_b64).await?;
    for (cpk, nickname) in nicknames {
        info.members.insert(cpk.as_pem().to_string(), nickname);
    }

    let plaintext = serde_json::to_vec(&info)?;
    let blob = sym_encrypt(&group_key, &plaintext)?;
    let path = format!("{dir}/info.json.enc");
    fs.write(&path, &blob, true).await
}

/// Returns an empty list if `/groups` doesn't exist yet.
pub async fn list_groups(fs: &dyn ContentAddressedFs) -> Result<Vec<String>> {
    match fs.ls(GROUPS_DIR).await {
        Ok(entries) => Ok(entries.into_iter().map(|e| e.name).collect()),
        Err(e) if e.is_path_missing() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{upsert_contact, ContactRecord};
    use crate::fs::InMemoryFs;
    use crate::keys::to_canonical_public_key;
    use crate::testutil::StaticIdentity;

    async fn add_contact_with_secret(
        fs: &InMemoryFs,
        master_key: &SymmetricKey,
        cpk: &CanonicalPublicKey,
        secret: &SymmetricKey,
    ) {
        upsert_contact(
            fs,
            master_key,
            cpk.as_pem(),
            ContactRecord {
                my_secret: Some(b64_url_encode(secret.as_bytes())),
                extra: Default::default(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn create_group_of_two_seeds_empty_nicknames() {
        let fs = InMemoryFs::new();
        let master_key = SymmetricKey::generate();
        let self_identity = StaticIdentity::generate();
        let self_cpk = to_canonical_public_key(self_identity.public_key_pem().as_bytes()).unwrap();

        let a_identity = StaticIdentity::generate();
        let a_cpk = to_canonical_public_key(a_identity.public_key_pem().as_bytes()).unwrap();
        let a_secret = SymmetricKey::generate();
        add_contact_with_secret(&fs, &master_key, &a_cpk, &a_secret).await;

        let b_identity = StaticIdentity::generate();
        let b_cpk = to_canonical_public_key(b_identity.public_key_pem().as_bytes()).unwrap();
        let b_secret = SymmetricKey::generate();
        add_contact_with_secret(&fs, &master_key, &b_cpk, &b_secret).await;

        let group_b64 = create_group(
            &fs,
            &master_key,
            &self_cpk,
            &[a_cpk.clone(), b_cpk.clone()],
            None,
        )
        .await
        .unwrap();

        let group_key = get_group_key(&fs, &master_key, &group_b64).await.unwrap();
        let info = get_group_info(&fs, &group_key, &group_b64).await.unwrap();

        assert_eq!(info.members.len(), 3);
        assert_eq!(info.members.get(self_cpk.as_pem()).unwrap(), "");
        assert_eq!(info.members.get(a_cpk.as_pem()).unwrap(), "");
        assert_eq!(info.members.get(b_cpk.as_pem()).unwrap(), "");
    }

    #[tokio::test]
    async fn create_group_with_explicit_id_is_preserved_through_nickname_seeding() {
        let fs = InMemoryFs::new();
        let master_key = SymmetricKey::generate();
        let self_identity = StaticIdentity::generate();
        let self_cpk = to_canonical_public_key(self_identity.public_key_pem().as_bytes()).unwrap();

        let a_identity = StaticIdentity::generate();
        let a_cpk = to_canonical_public_key(a_identity.public_key_pem().as_bytes()).unwrap();
        let a_secret = SymmetricKey::generate();
        add_contact_with_secret(&fs, &master_key, &a_cpk, &a_secret).await;

        let group_b64 = create_group(
            &fs,
            &master_key,
            &self_cpk,
            &[a_cpk.clone()],
            Some("g1".to_string()),
        )
        .await
        .unwrap();

        let group_key = get_group_key(&fs, &master_key, &group_b64).await.unwrap();
        let info = get_group_info(&fs, &group_key, &group_b64).await.unwrap();
        assert_eq!(info.id, "g1");

        let dir_entries = fs.ls(&format!("{GROUPS_DIR}/{group_b64}")).await.unwrap();
        let mut names: Vec<String> = dir_entries.into_iter().map(|e| e.name).collect();
        names.sort();
        let group_salt = b64_url_decode(&group_b64).unwrap();
        let mut expected = vec![
            "me".to_string(),
            "info.json.enc".to_string(),
            member_filename(&group_salt, &a_secret),
        ];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn create_group_with_unknown_member_leaves_groups_untouched() {
        let fs = InMemoryFs::new();
        let master_key = SymmetricKey::generate();
        let self_identity = StaticIdentity::generate();
        let self_cpk = to_canonical_public_key(self_identity.public_key_pem().as_bytes()).unwrap();

        let unknown_identity = StaticIdentity::generate();
        let unknown_cpk =
            to_canonical_public_key(unknown_identity.public_key_pem().as_bytes()).unwrap();

        let err = create_group(&fs, &master_key, &self_cpk, &[unknown_cpk], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMember(_)));
        assert!(list_groups(&fs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_groups_is_empty_when_directory_absent() {
        let fs = InMemoryFs::new();
        assert!(list_groups(&fs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn member_can_recover_group_key_via_pairwise_secret() {
        let fs = InMemoryFs::new();
        let master_key = SymmetricKey::generate();
        let self_identity = StaticIdentity::generate();
        let self_cpk = to_canonical_public_key(self_identity.public_key_pem().as_bytes()).unwrap();

        let a_identity = StaticIdentity::generate();
        let a_cpk = to_canonical_public_key(a_identity.public_key_pem().as_bytes()).unwrap();
        let a_secret = SymmetricKey::generate();
        add_contact_with_secret(&fs, &master_key, &a_cpk, &a_secret).await;

        let group_b64 = create_group(&fs, &master_key, &self_cpk, &[a_cpk.clone()], None)
            .await
            .unwrap();
        let group_salt = b64_url_decode(&group_b64).unwrap();

        let owner_key = get_group_key(&fs, &master_key, &group_b64).await.unwrap();
        let member_key = get_group_key_as_member(&fs, &group_salt, &a_secret)
            .await
            .unwrap();
        assert_eq!(owner_key.as_bytes(), member_key.as_bytes());
    }
}
