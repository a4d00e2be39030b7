//! Password Reset Token Entity
//!
//! Single use: consumed (deleted) by a successful reset.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{PasswordResetTokenId, UserId, opaque_token::OpaqueToken};

#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: PasswordResetTokenId,
    pub user_id: UserId,
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn issue(user_id: UserId, ttl: Duration) -> (Self, OpaqueToken) {
        let token = OpaqueToken::generate();
        let now = Utc::now();

        let record = Self {
            id: PasswordResetTokenId::new(),
            user_id,
            token_digest: token.digest(),
            expires_at: now + ttl,
            created_at: now,
            updated_at: now,
        };

        (record, token)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
