//! # Gravity Core
//!
//! The cryptographic protocol core for a decentralized social profile
//! stored as a tree on a content-addressed filesystem. This crate owns
//! the key hierarchy (master key, pairwise secrets, group keys), the
//! subscriber handshake peers use to establish a pairwise secret, and
//! the group layer that bundles several pairwise relationships behind a
//! single symmetric key with a shared nickname roster.
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Cryptographic primitives (AEAD, RSA-OAEP, hashing, encoding)
//! - [`keys`] - Canonical public key normalization
//! - [`fs`] - The profile tree abstraction over a content-addressed filesystem
//! - [`node_identity`] - The underlying asymmetric identity collaborator
//! - [`masterkey`] - The master key and its key-value store collaborator
//! - [`contacts`] - The contacts registry (pairwise secrets by peer)
//! - [`subscribers`] - The subscriber handshake
//! - [`groups`] - Group creation, key recovery, and nickname rosters
//! - [`publisher`] - Publishing and resolving profile roots
//! - [`core`] - `GravityCore`, the single handle tying every module together
//!
//! ## Key Hierarchy
//!
//! ```text
//! Master key (M)  ──encrypts──>  contacts registry, "me" group-key files
//!      │
//!      ▼ (per peer, via the subscriber handshake)
//! Pairwise secret (S)  ──encrypts──>  per-member group-key files
//!      │
//!      ▼ (per group, seeded into every member's directory entry)
//! Group key (K_G)  ──encrypts──>  group nickname roster (info.json.enc)
//! ```
//!
//! Every layer is a 256-bit AES-256-GCM key sharing the same blob format
//! (`nonce ‖ ciphertext+tag`). The master key and node identity keypair
//! are external collaborators this crate never generates.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod contacts;
pub mod core;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod groups;
pub mod keys;
pub mod masterkey;
pub mod node_identity;
pub mod publisher;
pub mod subscribers;

pub mod testutil;

pub use core::{GravityConfig, GravityCore};
pub use error::{Error, Result};
pub use keys::CanonicalPublicKey;
