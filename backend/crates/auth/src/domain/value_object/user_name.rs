//! User Name Value Object
//!
//! Free-text display name. Not unique and not an identifier: tokens and
//! lookups that matter use [`kernel::id::UserId`].

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

use crate::error::{AuthError, AuthResult};

/// Maximum length for user name (in characters)
pub const USER_NAME_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserName(String);

impl UserName {
    /// NFKC normalize, trim, then check length and characters
    pub fn new(raw: impl AsRef<str>) -> AuthResult<Self> {
        let normalized: String = raw.as_ref().nfkc().collect();
        let name = normalized.trim();

        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".into()));
        }

        let char_count = name.chars().count();
        if char_count > USER_NAME_MAX_LENGTH {
            return Err(AuthError::Validation(format!(
                "Name must be at most {USER_NAME_MAX_LENGTH} characters (got {char_count})"
            )));
        }

        if name.chars().any(char::is_control) {
            return Err(AuthError::Validation(
                "Name contains invalid control characters".into(),
            ));
        }

        Ok(Self(name.to_string()))
    }

    pub fn from_db(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
