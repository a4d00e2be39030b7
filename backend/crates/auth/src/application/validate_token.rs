//! Validate Token Use Case
//!
//! Verifies an access token and re-reads the user so that status and role
//! changes take effect before the token expires.

use std::sync::Arc;

use crate::application::{bounded, config::AuthConfig};
use crate::domain::entity::User;
use crate::domain::repository::UserRepository;
use crate::domain::services::{Claims, TokenSigner};
use crate::domain::value_object::permission::Permission;
use crate::error::{AuthError, AuthResult};

/// Validate token input
pub struct ValidateTokenInput {
    pub access_token: String,
    /// Permission codes that must all be granted. Resolved only after the
    /// token and the account check out; an unknown code is never granted.
    pub required_permissions: Vec<String>,
}

/// Validate token output
#[derive(Debug)]
pub struct ValidateTokenOutput {
    pub user: User,
    pub permissions: Vec<Permission>,
    pub claims: Claims,
}

/// Validate token use case
pub struct ValidateTokenUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    signer: Arc<TokenSigner>,
    config: Arc<AuthConfig>,
}

impl<U> ValidateTokenUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, signer: Arc<TokenSigner>, config: Arc<AuthConfig>) -> Self {
        Self {
            user_repo,
            signer,
            config,
        }
    }

    pub async fn execute(&self, input: ValidateTokenInput) -> AuthResult<ValidateTokenOutput> {
        let claims = self.signer.verify(&input.access_token)?;
        let user_id = claims.user_id()?;

        let user = bounded(
            self.config.store_timeout,
            "user find_by_id",
            self.user_repo.find_by_id(&user_id),
        )
        .await?
        .ok_or(AuthError::InvalidToken)?;

        if !user.can_login() {
            return Err(AuthError::AccountNotActive);
        }

        for code in &input.required_permissions {
            let granted = code
                .parse::<Permission>()
                .is_ok_and(|permission| user.role.has_permission(permission));
            if !granted {
                tracing::debug!(
                    user_id = %user.id,
                    role = %user.role,
                    permission = %code,
                    "Permission denied"
                );
                return Err(AuthError::Forbidden);
            }
        }

        let permissions = user.permissions().to_vec();
        Ok(ValidateTokenOutput {
            user,
            permissions,
            claims,
        })
    }
}
