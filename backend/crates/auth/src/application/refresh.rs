//! Refresh Use Case
//!
//! Rotates a refresh token and issues a new access token for the same user.
//! Every failure is terminal for the presented token.

use std::sync::Arc;

use chrono::Utc;

use crate::application::{
    bounded,
    config::AuthConfig,
    session::{SessionIssuer, TokenPair},
};
use crate::domain::repository::{RefreshTokenRepository, UserRepository};
use crate::domain::value_object::opaque_token::OpaqueToken;
use crate::error::{AuthError, AuthResult};

/// Refresh use case
pub struct RefreshUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    user_repo: Arc<U>,
    token_repo: Arc<T>,
    sessions: SessionIssuer<T>,
    config: Arc<AuthConfig>,
}

impl<U, T> RefreshUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        token_repo: Arc<T>,
        sessions: SessionIssuer<T>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            token_repo,
            sessions,
            config,
        }
    }

    pub async fn execute(&self, refresh_token: String) -> AuthResult<TokenPair> {
        let presented = OpaqueToken::from_client(refresh_token);
        if presented.is_empty() {
            return Err(AuthError::InvalidRefreshToken);
        }

        let now = Utc::now();
        let replacement = OpaqueToken::generate();
        let expires_at = now + self.config.refresh_token_ttl_chrono();

        let rotated = bounded(
            self.config.store_timeout,
            "refresh token rotate",
            self.token_repo
                .rotate(&presented.digest(), &replacement.digest(), expires_at, now),
        )
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;

        let user = bounded(
            self.config.store_timeout,
            "user find_by_id",
            self.user_repo.find_by_id(&rotated.user_id),
        )
        .await?;

        let user = match user {
            Some(user) if user.can_login() => user,
            Some(user) => {
                // End the session instead of extending it
                self.discard(&replacement).await;
                tracing::info!(user_id = %user.id, status = %user.status, "Refresh refused for inactive account");
                return Err(AuthError::AccountNotActive);
            }
            None => {
                self.discard(&replacement).await;
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        tracing::debug!(user_id = %user.id, session_id = %rotated.id, "Refresh token rotated");

        self.sessions
            .reissue_access(&user.id, replacement.into_string(), rotated.expires_at)
    }

    async fn discard(&self, token: &OpaqueToken) {
        let result = bounded(
            self.config.store_timeout,
            "refresh token delete",
            self.token_repo.delete_by_digest(&token.digest()),
        )
        .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to discard refresh token");
        }
    }
}
