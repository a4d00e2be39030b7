//! Register Use Case
//!
//! Creates a self-service account. Admin accounts are created through
//! [`CreateAdminUseCase`](super::admin::CreateAdminUseCase) instead.

use std::sync::Arc;

use crate::application::{
    bounded,
    config::AuthConfig,
    events::{AuthEvent, EventPublisher},
    session::{SessionIssuer, TokenPair},
};
use crate::domain::entity::{NewUser, User};
use crate::domain::repository::{RefreshTokenRepository, UserRepository};
use crate::domain::services::{TotpEnrollment, TotpManager};
use crate::domain::value_object::{
    UserId,
    email::Email,
    user_name::UserName,
    user_password::{RawPassword, UserPassword},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Register input
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    /// Role code; only `user` is accepted here
    pub role: Option<String>,
}

/// Register output
#[derive(Debug)]
pub struct RegisterOutput {
    pub user: User,
    /// Shown once so the user can enroll an authenticator
    pub totp: TotpEnrollment,
}

/// Validated account fields shared by registration and admin creation
pub(crate) struct AccountFields {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

/// Validate, check uniqueness, hash and persist a new Active user
pub(crate) async fn create_account<U>(
    user_repo: &U,
    config: &AuthConfig,
    fields: AccountFields,
    role: UserRole,
    created_by: Option<UserId>,
) -> AuthResult<(User, TotpEnrollment)>
where
    U: UserRepository,
{
    let name = UserName::new(&fields.name)?;
    let email = Email::new(&fields.email)?;
    let raw_password = RawPassword::new(fields.password)?;

    // Cheap pre-check; the unique constraint still decides races
    if bounded(
        config.store_timeout,
        "user exists_by_email",
        user_repo.exists_by_email(&email),
    )
    .await?
    {
        return Err(AuthError::DuplicateEmail);
    }

    let password_hash =
        UserPassword::hash(raw_password, config.pepper(), config.hashing_cost).await?;

    let totp = TotpManager::new(&config.totp_issuer).generate_secret(email.as_str())?;

    let user = User::new(NewUser {
        email,
        password_hash,
        name,
        phone: fields.phone,
        totp_secret: totp.secret.clone(),
        role,
        created_by,
    });

    bounded(config.store_timeout, "user create", user_repo.create(&user)).await?;

    Ok((user, totp))
}

/// Parse the optional role of a public registration
fn self_service_role(role: Option<&str>) -> AuthResult<UserRole> {
    let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
        Some(code) => code.parse::<UserRole>()?,
        None => UserRole::User,
    };

    if role.is_admin_or_higher() {
        return Err(AuthError::InsufficientPrivilege);
    }
    Ok(role)
}

/// Register use case
pub struct RegisterUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    events: Arc<dyn EventPublisher>,
    config: Arc<AuthConfig>,
}

impl<U> RegisterUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, events: Arc<dyn EventPublisher>, config: Arc<AuthConfig>) -> Self {
        Self {
            user_repo,
            events,
            config,
        }
    }

    pub async fn execute(&self, input: RegisterInput) -> AuthResult<RegisterOutput> {
        let role = self_service_role(input.role.as_deref())?;

        let (user, totp) = create_account(
            self.user_repo.as_ref(),
            &self.config,
            AccountFields {
                name: input.name,
                email: input.email,
                password: input.password,
                phone: input.phone,
            },
            role,
            None,
        )
        .await?;

        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            role = %user.role,
            "User registered"
        );

        self.events.publish(AuthEvent::UserRegistered {
            user_id: user.id,
            email: user.email.to_string(),
            role: user.role,
        });

        Ok(RegisterOutput { user, totp })
    }
}

/// Register output with a first session
pub struct RegisterWithSessionOutput {
    pub user: User,
    pub totp: TotpEnrollment,
    pub tokens: TokenPair,
}

/// Register and sign in
///
/// No TOTP check: the enrollment secret has only just been shown.
pub struct RegisterWithSessionUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    register: RegisterUseCase<U>,
    sessions: SessionIssuer<T>,
}

impl<U, T> RegisterWithSessionUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    pub fn new(register: RegisterUseCase<U>, sessions: SessionIssuer<T>) -> Self {
        Self { register, sessions }
    }

    pub async fn execute(&self, input: RegisterInput) -> AuthResult<RegisterWithSessionOutput> {
        let RegisterOutput { user, totp } = self.register.execute(input).await?;
        let tokens = self.sessions.issue(&user).await?;

        Ok(RegisterWithSessionOutput { user, totp, tokens })
    }
}
