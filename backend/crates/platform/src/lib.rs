//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations for the auth service:
//! - Cryptographic utilities (random bytes, opaque tokens, SHA-256 digests)
//! - Credential hashing (Argon2id with tunable cost, NIST SP 800-63B policy)

pub mod crypto;
pub mod password;
