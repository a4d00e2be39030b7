//! Refresh Token Entity
//!
//! One row per login session. Rotation replaces `token_digest` and
//! `expires_at` in place, so the row id identifies the session for its
//! whole life.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{RefreshTokenId, UserId, opaque_token::OpaqueToken};

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    /// Digest of the bearer value, see [`OpaqueToken::digest`]
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Start a new session. The returned bearer value is never stored.
    pub fn issue(user_id: UserId, ttl: Duration) -> (Self, OpaqueToken) {
        let token = OpaqueToken::generate();
        let now = Utc::now();

        let record = Self {
            id: RefreshTokenId::new(),
            user_id,
            token_digest: token.digest(),
            expires_at: now + ttl,
            revoked: false,
            created_at: now,
            updated_at: now,
        };

        (record, token)
    }

    /// Usable iff not revoked and not yet expired
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}
