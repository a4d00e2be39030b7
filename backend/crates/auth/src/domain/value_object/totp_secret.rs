//! TOTP Secret Value Object
//!
//! Shared secret for time-based one-time codes. Google Authenticator
//! compatible: SHA1, 6 digits, 30 second step, one step of clock skew.

use std::fmt;

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{AuthError, AuthResult};

pub const TOTP_DIGITS: usize = 6;
pub const TOTP_STEP: u64 = 30;
/// Steps accepted on either side of the current one
pub const TOTP_SKEW: u8 = 1;

/// TOTP secret (base32), set once at registration
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret {
    secret_base32: String,
}

impl TotpSecret {
    /// Generate a new random 160-bit secret
    pub fn generate() -> Self {
        Self {
            secret_base32: Secret::generate_secret().to_encoded().to_string(),
        }
    }

    /// Create from a base32-encoded string (from database)
    pub fn from_base32(secret: impl Into<String>) -> AuthResult<Self> {
        let secret_base32 = secret.into();
        Secret::Encoded(secret_base32.clone())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {e:?}")))?;
        Ok(Self { secret_base32 })
    }

    /// Get the base32-encoded secret for storage and enrollment
    pub fn as_base32(&self) -> &str {
        &self.secret_base32
    }

    fn to_totp(&self, issuer: Option<&str>, account_name: &str) -> AuthResult<TOTP> {
        let bytes = Secret::Encoded(self.secret_base32.clone())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {e:?}")))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            bytes,
            issuer.map(str::to_string),
            account_name.to_string(),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to create TOTP: {e}")))
    }

    /// Check `code` against the steps around `unix_time`
    ///
    /// Comparison is constant-time inside `totp-rs`.
    pub fn verify_at(&self, code: &str, unix_time: u64) -> AuthResult<bool> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        Ok(self.to_totp(None, "")?.check(code, unix_time))
    }

    /// The code for the step containing `unix_time`
    pub fn code_at(&self, unix_time: u64) -> AuthResult<String> {
        Ok(self.to_totp(None, "")?.generate(unix_time))
    }

    /// `otpauth://totp/...` provisioning URI
    pub fn enrollment_uri(&self, issuer: &str, account_name: &str) -> AuthResult<String> {
        Ok(self.to_totp(Some(issuer), account_name)?.get_url())
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotpSecret")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
