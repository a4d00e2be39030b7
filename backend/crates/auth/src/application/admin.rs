//! Admin Use Cases
//!
//! Directory management. Mutating operations take the acting user's id and
//! re-read that user: the actor must be an Active SuperAdmin at the time of
//! the call, whatever its token said.

use std::sync::Arc;

use crate::application::{
    bounded,
    config::AuthConfig,
    events::{AuthEvent, EventPublisher},
    register::{AccountFields, create_account},
};
use crate::domain::entity::User;
use crate::domain::repository::{ListUsersQuery, RefreshTokenRepository, UserRepository};
use crate::domain::services::TotpEnrollment;
use crate::domain::value_object::{
    UserId, email::Email, permission::Permission, user_name::UserName, user_role::UserRole,
    user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

/// Load the acting user and require an Active SuperAdmin
async fn require_super_admin<U>(user_repo: &U, config: &AuthConfig, actor_id: &UserId) -> AuthResult<User>
where
    U: UserRepository,
{
    let actor = bounded(
        config.store_timeout,
        "user find_by_id",
        user_repo.find_by_id(actor_id),
    )
    .await?
    .ok_or(AuthError::InsufficientPrivilege)?;

    if !actor.can_login() || !actor.is_super_admin() {
        tracing::warn!(
            actor_id = %actor.id,
            role = %actor.role,
            status = %actor.status,
            "Admin operation refused"
        );
        return Err(AuthError::InsufficientPrivilege);
    }
    Ok(actor)
}

async fn load_target<U>(user_repo: &U, config: &AuthConfig, id: &UserId) -> AuthResult<User>
where
    U: UserRepository,
{
    bounded(config.store_timeout, "user find_by_id", user_repo.find_by_id(id))
        .await?
        .ok_or(AuthError::UserNotFound)
}

// ============================================================================
// CreateAdmin
// ============================================================================

/// Create admin input
pub struct CreateAdminInput {
    pub creator_id: UserId,
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: UserRole,
}

/// Create admin use case
pub struct CreateAdminUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    events: Arc<dyn EventPublisher>,
    config: Arc<AuthConfig>,
}

impl<U> CreateAdminUseCase<U>
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

    pub async fn execute(&self, input: CreateAdminInput) -> AuthResult<(User, TotpEnrollment)> {
        if !input.role.is_admin_or_higher() {
            return Err(AuthError::Validation(
                "Role must be admin or super_admin".into(),
            ));
        }

        let creator = require_super_admin(self.user_repo.as_ref(), &self.config, &input.creator_id).await?;
        if !creator.role.has_permission(Permission::AdminCreate)
            || (input.role.is_super_admin() && !creator.is_super_admin())
        {
            return Err(AuthError::InsufficientPrivilege);
        }

        let (admin, totp) = create_account(
            self.user_repo.as_ref(),
            &self.config,
            AccountFields {
                name: input.name,
                email: input.email,
                password: input.password,
                phone: input.phone,
            },
            input.role,
            Some(creator.id),
        )
        .await?;

        tracing::info!(
            user_id = %admin.id,
            role = %admin.role,
            created_by = %creator.id,
            "Admin created"
        );

        self.events.publish(AuthEvent::AdminCreated {
            user_id: admin.id,
            role: admin.role,
            created_by: creator.id,
        });

        Ok((admin, totp))
    }
}

// ============================================================================
// ListUsers / LookupUser
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(query: &ListUsersQuery, total: u64) -> Self {
        Self {
            page: query.page,
            limit: query.limit,
            total,
            total_pages: total.div_ceil(u64::from(query.limit)),
        }
    }
}

pub struct ListUsersOutput {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

/// List users use case
pub struct ListUsersUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
}

impl<U> ListUsersUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self { user_repo, config }
    }

    pub async fn execute(&self, query: ListUsersQuery) -> AuthResult<ListUsersOutput> {
        let (users, total) = bounded(
            self.config.store_timeout,
            "user list",
            self.user_repo.list(&query),
        )
        .await?;

        Ok(ListUsersOutput {
            users,
            pagination: Pagination::new(&query, total),
        })
    }
}

/// Key for a single-user lookup
#[derive(Debug, Clone)]
pub enum UserLookup {
    Id(UserId),
    Email(String),
    Name(String),
}

/// Lookup user use case
pub struct LookupUserUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
}

impl<U> LookupUserUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self { user_repo, config }
    }

    pub async fn execute(&self, lookup: UserLookup) -> AuthResult<User> {
        let timeout = self.config.store_timeout;
        let user = match lookup {
            UserLookup::Id(id) => {
                bounded(timeout, "user find_by_id", self.user_repo.find_by_id(&id)).await?
            }
            UserLookup::Email(email) => {
                let email = Email::new(email)?;
                bounded(timeout, "user find_by_email", self.user_repo.find_by_email(&email)).await?
            }
            UserLookup::Name(name) => {
                let name = UserName::new(name)?;
                bounded(timeout, "user find_by_name", self.user_repo.find_by_name(&name)).await?
            }
        };

        user.ok_or(AuthError::UserNotFound)
    }
}

// ============================================================================
// UpdateUserRole
// ============================================================================

pub struct UpdateUserRoleInput {
    pub user_id: UserId,
    pub new_role: UserRole,
    pub updated_by: UserId,
}

/// Update user role use case
pub struct UpdateUserRoleUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    events: Arc<dyn EventPublisher>,
    config: Arc<AuthConfig>,
}

impl<U> UpdateUserRoleUseCase<U>
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

    pub async fn execute(&self, input: UpdateUserRoleInput) -> AuthResult<User> {
        let updater = require_super_admin(self.user_repo.as_ref(), &self.config, &input.updated_by).await?;
        let mut target = load_target(self.user_repo.as_ref(), &self.config, &input.user_id).await?;

        let old_role = target.role;
        if old_role == input.new_role {
            return Ok(target);
        }

        target.set_role(input.new_role, updater.id);
        bounded(
            self.config.store_timeout,
            "user set_role",
            self.user_repo
                .set_role(&target.id, target.role, &updater.id, target.updated_at),
        )
        .await?;

        tracing::info!(
            user_id = %target.id,
            old_role = %old_role,
            new_role = %target.role,
            updated_by = %updater.id,
            "User role changed"
        );

        self.events.publish(AuthEvent::UserRoleChanged {
            user_id: target.id,
            old_role,
            new_role: target.role,
            updated_by: updater.id,
        });

        Ok(target)
    }
}

// ============================================================================
// DeactivateUser
// ============================================================================

pub struct DeactivateUserInput {
    pub user_id: UserId,
    pub new_status: UserStatus,
    pub reason: Option<String>,
    pub updated_by: UserId,
}

/// Change a user's status. Leaving Active ends all of the user's sessions.
pub struct DeactivateUserUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    user_repo: Arc<U>,
    token_repo: Arc<T>,
    events: Arc<dyn EventPublisher>,
    config: Arc<AuthConfig>,
}

impl<U, T> DeactivateUserUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        token_repo: Arc<T>,
        events: Arc<dyn EventPublisher>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            token_repo,
            events,
            config,
        }
    }

    pub async fn execute(&self, input: DeactivateUserInput) -> AuthResult<User> {
        let updater = require_super_admin(self.user_repo.as_ref(), &self.config, &input.updated_by).await?;
        let mut target = load_target(self.user_repo.as_ref(), &self.config, &input.user_id).await?;

        // A SuperAdmin's status is only changed by that SuperAdmin
        if target.is_super_admin() && target.id != updater.id {
            tracing::warn!(
                user_id = %target.id,
                updated_by = %updater.id,
                "Refused to change another super admin's status"
            );
            return Err(AuthError::InsufficientPrivilege);
        }

        let old_status = target.status;
        let reason = input
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        target.set_status(input.new_status, updater.id);
        bounded(
            self.config.store_timeout,
            "user set_status",
            self.user_repo
                .set_status(&target.id, target.status, &updater.id, target.updated_at),
        )
        .await?;

        let sessions_revoked = if target.can_login() {
            0
        } else {
            bounded(
                self.config.store_timeout,
                "refresh token delete_all_for_user",
                self.token_repo.delete_all_for_user(&target.id),
            )
            .await?
        };

        tracing::info!(
            user_id = %target.id,
            old_status = %old_status,
            new_status = %target.status,
            reason = reason.as_deref().unwrap_or(""),
            sessions_revoked,
            updated_by = %updater.id,
            "User status changed"
        );

        self.events.publish(AuthEvent::UserStatusChanged {
            user_id: target.id,
            old_status,
            new_status: target.status,
            reason,
            updated_by: updater.id,
        });

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_pages() {
        let query = ListUsersQuery::new(Some(2), Some(10), None, None);
        assert_eq!(Pagination::new(&query, 0).total_pages, 0);
        assert_eq!(Pagination::new(&query, 10).total_pages, 1);
        assert_eq!(Pagination::new(&query, 11).total_pages, 2);
        assert_eq!(Pagination::new(&query, 11).page, 2);
    }
}
