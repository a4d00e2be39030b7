//! Opaque Token Value Object
//!
//! Bearer value of refresh and password-reset tokens: 32 random bytes,
//! URL-safe base64, no structure. Only its digest is persisted.

use std::fmt;

use platform::crypto;

#[derive(Clone)]
pub struct OpaqueToken(String);

impl OpaqueToken {
    pub fn generate() -> Self {
        Self(crypto::random_token())
    }

    /// Wrap a value presented by a client
    pub fn from_client(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Storage key for this token
    pub fn digest(&self) -> String {
        crypto::token_digest(&self.0)
    }
}

impl PartialEq for OpaqueToken {
    fn eq(&self, other: &Self) -> bool {
        crypto::constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }
}

impl Eq for OpaqueToken {}

impl fmt::Debug for OpaqueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueToken").field(&"[REDACTED]").finish()
    }
}
