//! Application Layer
//!
//! Use cases orchestrating the domain services and stores.

pub mod admin;
pub mod config;
pub mod events;
pub mod login;
pub mod logout;
pub mod password_reset;
pub mod refresh;
pub mod register;
pub mod session;
pub mod validate_token;

use std::future::Future;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

// Re-exports
pub use admin::{
    CreateAdminInput, CreateAdminUseCase, DeactivateUserInput, DeactivateUserUseCase,
    ListUsersOutput, ListUsersUseCase, LookupUserUseCase, Pagination, UpdateUserRoleInput,
    UpdateUserRoleUseCase, UserLookup,
};
pub use config::AuthConfig;
pub use events::{AuthEvent, EventPublisher, TracingEventPublisher};
pub use login::{LoginInput, LoginOutput, LoginUseCase};
pub use logout::LogoutUseCase;
pub use password_reset::{
    ForgotPasswordOutput, ForgotPasswordUseCase, ResetPasswordInput, ResetPasswordUseCase,
};
pub use refresh::RefreshUseCase;
pub use register::{
    RegisterInput, RegisterOutput, RegisterUseCase, RegisterWithSessionOutput,
    RegisterWithSessionUseCase,
};
pub use session::{SessionIssuer, TokenPair};
pub use validate_token::{ValidateTokenInput, ValidateTokenOutput, ValidateTokenUseCase};

/// Bound a store call by `limit`; elapsing yields a retryable `Unavailable`.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Store call timed out"
            );
            Err(AuthError::Unavailable(format!("{operation} timed out")))
        }
    }
}
