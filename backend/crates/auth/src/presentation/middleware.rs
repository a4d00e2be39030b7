//! Bearer Authentication
//!
//! Extractor for routes that require a valid access token. The token is
//! validated through the same use case as `POST /validate`, so role and
//! status changes apply immediately.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};

use crate::application::{ValidateTokenInput, ValidateTokenUseCase};
use crate::domain::entity::User;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::permission::Permission;
use crate::error::{AuthError, AuthResult};
use crate::presentation::handlers::AuthAppState;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// `Forbidden` unless the caller's current role grants `permission`
    pub fn require(&self, permission: Permission) -> AuthResult<()> {
        if self.permissions.contains(&permission) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user.id,
                permission = %permission,
                "Bearer lacks permission"
            );
            Err(AuthError::Forbidden)
        }
    }
}

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl<R> FromRequestParts<AuthAppState<R>> for Principal
where
    R: AuthStore,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthAppState<R>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::InvalidToken)?;

        let use_case = ValidateTokenUseCase::new(
            state.repo.clone(),
            state.signer.clone(),
            state.config.clone(),
        );
        let output = use_case
            .execute(ValidateTokenInput {
                access_token: token.to_string(),
                required_permissions: Vec::new(),
            })
            .await?;

        Ok(Principal {
            user: output.user,
            permissions: output.permissions,
        })
    }
}
