//! User Password Value Object
//!
//! Domain wrapper over `platform::password`.
//!
//! ```rust,ignore
//! let raw = RawPassword::new("password123".to_string())?;
//! let hashed = UserPassword::hash(raw, None, HashingCost::default()).await?;
//! ```

use platform::password::{
    self, ClearTextPassword, HashedPassword, HashingCost, PasswordPolicyError,
};
use std::fmt;

use crate::error::{AuthError, AuthResult};

// ============================================================================
// Raw Password (User Input)
// ============================================================================

/// Raw password from user input, zeroized on drop
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// Validate a new password (registration, reset)
    pub fn new(raw: String) -> AuthResult<Self> {
        let clear_text = ClearTextPassword::new(raw).map_err(|e| {
            let message = match e {
                PasswordPolicyError::TooShort { min, .. } => {
                    format!("Password must be at least {min} characters")
                }
                PasswordPolicyError::TooLong { max, .. } => {
                    format!("Password must be at most {max} characters")
                }
                PasswordPolicyError::EmptyOrWhitespace => "Password is required".to_string(),
                PasswordPolicyError::InvalidCharacter => {
                    "Password contains invalid characters".to_string()
                }
            };
            AuthError::Validation(message)
        })?;

        Ok(Self(clear_text))
    }

    /// Accept a login attempt as-is. Policy is not re-applied to credentials
    /// that are only compared against a stored hash.
    pub fn for_verification(raw: String) -> Self {
        Self(ClearTextPassword::unvalidated(raw))
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

// ============================================================================
// User Password (Hashed, for storage)
// ============================================================================

/// Hashed user password (Argon2id PHC string)
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    /// Hash on the blocking pool. The raw password is consumed and zeroized.
    pub async fn hash(
        raw: RawPassword,
        pepper: Option<Vec<u8>>,
        cost: HashingCost,
    ) -> AuthResult<Self> {
        let hashed = password::hash_blocking(raw.0, pepper, cost).await?;
        Ok(Self(hashed))
    }

    /// Verify on the blocking pool
    pub async fn verify(&self, raw: RawPassword, pepper: Option<Vec<u8>>) -> AuthResult<bool> {
        Ok(password::verify_blocking(self.0.clone(), raw.0, pepper).await?)
    }

    /// Create from PHC string (from database)
    pub fn from_phc_string(phc_string: impl Into<String>) -> AuthResult<Self> {
        let hashed = HashedPassword::from_phc_string(phc_string)
            .map_err(|_| AuthError::Internal("Invalid password hash in database".into()))?;
        Ok(Self(hashed))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    pub fn needs_rehash(&self, cost: HashingCost) -> bool {
        self.0.needs_rehash(cost)
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_errors_are_validation() {
        assert!(matches!(
            RawPassword::new("short".into()),
            Err(AuthError::Validation(_))
        ));
        assert!(RawPassword::new("password123".into()).is_ok());
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = UserPassword::hash(
            RawPassword::new("password123".into()).unwrap(),
            None,
            HashingCost::minimal(),
        )
        .await
        .unwrap();

        assert!(hashed.as_phc_string().starts_with("$argon2id$"));
        assert!(
            hashed
                .verify(RawPassword::for_verification("password123".into()), None)
                .await
                .unwrap()
        );
        assert!(
            !hashed
                .verify(RawPassword::for_verification("password124".into()), None)
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_corrupt_hash_is_internal() {
        assert!(matches!(
            UserPassword::from_phc_string("plaintext!"),
            Err(AuthError::Internal(_))
        ));
    }
}
