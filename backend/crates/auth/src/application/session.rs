//! Session Issuance
//!
//! A session is one access token plus one refresh token row.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::{bounded, config::AuthConfig};
use crate::domain::entity::{RefreshToken, User};
use crate::domain::repository::RefreshTokenRepository;
use crate::domain::services::TokenSigner;
use crate::domain::value_object::UserId;
use crate::error::AuthResult;

/// Tokens handed to the client
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    /// Opaque, shown once
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Signs access tokens and persists refresh tokens
pub struct SessionIssuer<T>
where
    T: RefreshTokenRepository,
{
    token_repo: Arc<T>,
    signer: Arc<TokenSigner>,
    config: Arc<AuthConfig>,
}

impl<T> SessionIssuer<T>
where
    T: RefreshTokenRepository,
{
    pub fn new(token_repo: Arc<T>, signer: Arc<TokenSigner>, config: Arc<AuthConfig>) -> Self {
        Self {
            token_repo,
            signer,
            config,
        }
    }

    /// Start a new session for `user`
    pub async fn issue(&self, user: &User) -> AuthResult<TokenPair> {
        let access = self.signer.issue(&user.id, self.config.access_token_ttl)?;

        let (record, refresh_token) =
            RefreshToken::issue(user.id, self.config.refresh_token_ttl_chrono());
        bounded(
            self.config.store_timeout,
            "refresh token create",
            self.token_repo.create(&record),
        )
        .await?;

        tracing::debug!(user_id = %user.id, session_id = %record.id, "Session issued");

        Ok(TokenPair {
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token: refresh_token.into_string(),
            refresh_token_expires_at: record.expires_at,
        })
    }

    /// Access token for an existing session whose refresh token was rotated
    pub fn reissue_access(
        &self,
        user_id: &UserId,
        refresh_token: String,
        refresh_token_expires_at: DateTime<Utc>,
    ) -> AuthResult<TokenPair> {
        let access = self.signer.issue(user_id, self.config.access_token_ttl)?;

        Ok(TokenPair {
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token,
            refresh_token_expires_at,
        })
    }
}
