//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::password::HashingCost;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Access token lifetime (24 hours)
    pub access_token_ttl: Duration,
    /// Refresh token lifetime (7 days)
    pub refresh_token_ttl: Duration,
    /// Password reset token lifetime (1 hour)
    pub reset_token_ttl: Duration,
    /// Every login must present a valid TOTP code
    pub require_totp: bool,
    /// Logins that expect an elevated role must present a valid TOTP code
    pub require_totp_for_elevated: bool,
    /// Issuer shown by authenticator apps
    pub totp_issuer: String,
    /// `iss` claim of access tokens
    pub jwt_issuer: String,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Argon2id work factor
    pub hashing_cost: HashingCost,
    /// Upper bound for a single store call
    pub store_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(24 * 3600),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            reset_token_ttl: Duration::from_secs(3600),
            require_totp: false,
            require_totp_for_elevated: true,
            totp_issuer: "SusiApp".to_string(),
            jwt_issuer: "susi-auth-service".to_string(),
            password_pepper: None,
            hashing_cost: HashingCost::default(),
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl AuthConfig {
    /// Create config for development and tests (cheap hashing, no TOTP)
    pub fn development() -> Self {
        Self {
            require_totp_for_elevated: false,
            hashing_cost: HashingCost::minimal(),
            ..Default::default()
        }
    }

    /// Get password pepper as an owned buffer for the blocking pool
    pub fn pepper(&self) -> Option<Vec<u8>> {
        self.password_pepper.clone()
    }

    pub fn refresh_token_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.refresh_token_ttl)
    }

    pub fn reset_token_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.reset_token_ttl)
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
}
