//! Error types shared by every module in this crate.
//!
//! Errors are grouped by the concern they arise from rather than by
//! severity: crypto primitives, key normalization, group/contacts
//! validation, and the filesystem/store collaborators each get their own
//! variants. `Result<T>` is the alias used throughout the crate.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No master key has been set yet. Never auto-generated.
    #[error("no master key set")]
    NoMasterKey,

    /// A key could not be recognized by any canonicalization recognizer.
    #[error("unrecognized public key format")]
    UnrecognizedKey,

    /// A symmetric blob was too short to contain a nonce.
    #[error("ciphertext shorter than nonce")]
    ShortMessage,

    /// Decryption failed (bad key, bad nonce, or tampered ciphertext).
    /// Never surfaces as false plaintext.
    #[error("authentication failed")]
    AuthFailed,

    /// `create_group` was given a member CPK with no contacts entry.
    /// Carries the full list of unknown members; no partial writes occur.
    #[error("unknown members: {0:?}")]
    UnknownMember(Vec<String>),

    /// `set_nicknames` targeted a CPK with no existing member filename.
    /// Carries the full list of members not in the group.
    #[error("not in group: {0:?}")]
    NotInGroup(Vec<String>),

    /// No subscriber drop addressed to this identity was found.
    #[error("no subscriber drop for this identity")]
    NoDropForMe,

    /// A filesystem path did not exist.
    #[error("path missing: {0}")]
    PathMissing(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("filesystem error: {0}")]
    Fs(String),

    #[error("core already initialized")]
    AlreadyInitialized,

    #[error("core not initialized")]
    NotInitialized,
}

impl Error {
    /// True for the class of errors that mean "path does not exist",
    /// distinguishing them structurally from other filesystem failures.
    pub fn is_path_missing(&self) -> bool {
        matches!(self, Error::PathMissing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_missing_is_recognized_structurally() {
        let err = Error::PathMissing("/groups".into());
        assert!(err.is_path_missing());
        assert!(!Error::NoMasterKey.is_path_missing());
    }

    #[test]
    fn unknown_member_carries_full_list() {
        let err = Error::UnknownMember(vec!["a".into(), "b".into()]);
        match err {
            Error::UnknownMember(list) => assert_eq!(list, vec!["a", "b"]),
            _ => panic!("wrong variant"),
        }
    }
}
