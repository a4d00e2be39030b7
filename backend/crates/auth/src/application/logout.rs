//! Logout Use Case
//!
//! Deletes the session behind a refresh token. Always succeeds: unknown,
//! expired and already-revoked tokens are treated as logged out.

use std::sync::Arc;

use crate::application::{bounded, config::AuthConfig};
use crate::domain::repository::RefreshTokenRepository;
use crate::domain::value_object::opaque_token::OpaqueToken;

/// Logout use case
pub struct LogoutUseCase<T>
where
    T: RefreshTokenRepository,
{
    token_repo: Arc<T>,
    config: Arc<AuthConfig>,
}

impl<T> LogoutUseCase<T>
where
    T: RefreshTokenRepository,
{
    pub fn new(token_repo: Arc<T>, config: Arc<AuthConfig>) -> Self {
        Self { token_repo, config }
    }

    pub async fn execute(&self, refresh_token: String) {
        let token = OpaqueToken::from_client(refresh_token);
        if token.is_empty() {
            return;
        }

        match bounded(
            self.config.store_timeout,
            "refresh token delete",
            self.token_repo.delete_by_digest(&token.digest()),
        )
        .await
        {
            Ok(true) => tracing::info!("Session ended"),
            Ok(false) => tracing::debug!("Logout with unknown refresh token"),
            Err(e) => tracing::warn!(error = %e, "Failed to delete refresh token on logout"),
        }
    }
}
