//! Publishing this node's own profile root, and resolving someone else's.
//! Resolution is a naming-service lookup this crate does not implement —
//! see Open Question (i) — so `get_profile_hash` falls back to a
//! caller-configured hash when the resolver has nothing to report,
//! primarily useful for testing against a fixed peer root.

use async_trait::async_trait;

use crate::error::Result;
use crate::fs::ContentAddressedFs;

/// Naming-service lookup, external to this crate. Returns `None` when
/// the resolver has nothing on file for that CPK.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_peer_root(&self, cpk_pem: &str) -> Option<String>;
}

pub async fn get_my_profile_hash(fs: &dyn ContentAddressedFs) -> Result<String> {
    Ok(fs.stat("/").await?.hash)
}

pub async fn get_profile_hash(
    resolver: &dyn NameResolver,
    cpk_pem: &str,
    fallback_hash: Option<&str>,
) -> Result<Option<String>> {
    if let Some(hash) = resolver.resolve_peer_root(cpk_pem).await {
        return Ok(Some(hash));
    }
    Ok(fallback_hash.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::testutil::NullNameResolver;

    #[tokio::test]
    async fn my_profile_hash_is_root_stat() {
        let fs = InMemoryFs::new();
        fs.write("/private/contacts.json.enc", b"x", true)
            .await
            .unwrap();
        let hash = get_my_profile_hash(&fs).await.unwrap();
        assert!(!hash.is_empty());
    }

    #[tokio::test]
    async fn falls_back_when_resolver_has_nothing() {
        let resolver = NullNameResolver;
        let hash = get_profile_hash(&resolver, "peer-cpk", Some("fallback-hash"))
            .await
            .unwrap();
        assert_eq!(hash.as_deref(), Some("fallback-hash"));
    }

    #[tokio::test]
    async fn no_fallback_means_none() {
        let resolver = NullNameResolver;
        let hash = get_profile_hash(&resolver, "peer-cpk", None).await.unwrap();
        assert!(hash.is_none());
    }
}
