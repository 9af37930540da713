//! Content-addressed naming: SHA-256 digests framed as self-describing
//! multihashes (the same framing a content-addressed filesystem node uses
//! for its own blocks) and rendered as Base58, matching every filename
//! derivation in the profile tree (subscriber drops, group members).

use multihash_codetable::{Code, MultihashDigest};

/// SHA-256 over `bytes`, multihash-framed, Base58-encoded.
pub fn keyed_hash(bytes: &[u8]) -> String {
    let digest = Code::Sha2_256.digest(bytes);
    bs58::encode(digest.to_bytes()).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(keyed_hash(b"gravity"), keyed_hash(b"gravity"));
    }

    #[test]
    fn distinguishes_input() {
        assert_ne!(keyed_hash(b"a"), keyed_hash(b"b"));
    }
}
