//! HTTP Handlers
//!
//! Bind JSON, call a use case, map the output. No auth decisions here.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use std::sync::Arc;

use crate::application::{
    CreateAdminInput, CreateAdminUseCase, DeactivateUserInput, DeactivateUserUseCase,
    EventPublisher, ForgotPasswordUseCase, ListUsersUseCase, LoginInput, LoginUseCase,
    LogoutUseCase, LookupUserUseCase, RefreshUseCase, RegisterInput, RegisterUseCase,
    RegisterWithSessionUseCase, ResetPasswordInput, ResetPasswordUseCase, SessionIssuer,
    UpdateUserRoleInput, UpdateUserRoleUseCase, UserLookup, ValidateTokenInput,
    ValidateTokenUseCase, config::AuthConfig,
};
use crate::domain::repository::{AuthStore, ListUsersQuery};
use crate::domain::services::TokenSigner;
use crate::domain::value_object::{
    UserId, permission::Permission, user_role::UserRole, user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    AuthResponse, CreateAdminRequest, CreateAdminResponse, ForgotPasswordRequest,
    ForgotPasswordResponse, ListUsersParams, ListUsersResponse, LoginRequest, LogoutRequest,
    LookupUserParams, MessageResponse, RefreshRequest, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, TokenResponse, UpdateRoleRequest, UpdateStatusRequest, UserResponse,
    ValidateRequest, ValidateResponse,
};
use crate::presentation::middleware::Principal;

/// Shared state for auth handlers
pub struct AuthAppState<R>
where
    R: AuthStore,
{
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub signer: Arc<TokenSigner>,
    pub events: Arc<dyn EventPublisher>,
}

impl<R> Clone for AuthAppState<R>
where
    R: AuthStore,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            config: self.config.clone(),
            signer: self.signer.clone(),
            events: self.events.clone(),
        }
    }
}

impl<R> AuthAppState<R>
where
    R: AuthStore,
{
    fn sessions(&self) -> SessionIssuer<R> {
        SessionIssuer::new(self.repo.clone(), self.signer.clone(), self.config.clone())
    }
}

fn parse_user_id(raw: &str) -> AuthResult<UserId> {
    raw.trim()
        .parse()
        .map_err(|_| AuthError::Validation(format!("Invalid user id: {raw}")))
}

// ============================================================================
// Register / Login
// ============================================================================

/// POST /api/auth/register
pub async fn register<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<RegisterResponse>)>
where
    R: AuthStore,
{
    let use_case = RegisterWithSessionUseCase::new(
        RegisterUseCase::new(state.repo.clone(), state.events.clone(), state.config.clone()),
        state.sessions(),
    );

    let output = use_case
        .execute(RegisterInput {
            name: req.name,
            email: req.email,
            password: req.password,
            phone: req.phone,
            role: req.role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(&output.user),
            tokens: output.tokens.into(),
            totp: (&output.totp).into(),
        }),
    ))
}

async fn login_as<R>(
    state: AuthAppState<R>,
    req: LoginRequest,
    expected_role: Option<UserRole>,
) -> AuthResult<Json<AuthResponse>>
where
    R: AuthStore,
{
    let use_case = LoginUseCase::new(state.repo.clone(), state.sessions(), state.config.clone());

    let output = use_case
        .execute(LoginInput {
            email: req.email,
            password: req.password,
            totp_code: req.totp_code,
            expected_role,
        })
        .await?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&output.user),
        tokens: output.tokens.into(),
    }))
}

/// POST /api/auth/login
pub async fn login<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>>
where
    R: AuthStore,
{
    login_as(state, req, None).await
}

/// POST /api/auth/admin/login
pub async fn admin_login<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>>
where
    R: AuthStore,
{
    login_as(state, req, Some(UserRole::Admin)).await
}

// ============================================================================
// Tokens
// ============================================================================

/// POST /api/auth/refresh
pub async fn refresh<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<Json<TokenResponse>>
where
    R: AuthStore,
{
    let use_case = RefreshUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.sessions(),
        state.config.clone(),
    );

    let tokens = use_case.execute(req.refresh_token).await?;
    Ok(Json(tokens.into()))
}

/// POST /api/auth/validate
pub async fn validate<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<ValidateRequest>,
) -> AuthResult<Json<ValidateResponse>>
where
    R: AuthStore,
{
    let use_case =
        ValidateTokenUseCase::new(state.repo.clone(), state.signer.clone(), state.config.clone());
    let output = use_case
        .execute(ValidateTokenInput {
            access_token: req.access_token,
            required_permissions: req.required_permissions,
        })
        .await?;

    Ok(Json(ValidateResponse {
        valid: true,
        user: UserResponse::from(&output.user),
        permissions: output.permissions,
    }))
}

/// POST /api/auth/logout
pub async fn logout<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<LogoutRequest>,
) -> StatusCode
where
    R: AuthStore,
{
    LogoutUseCase::new(state.repo.clone(), state.config.clone())
        .execute(req.refresh_token)
        .await;

    StatusCode::NO_CONTENT
}

// ============================================================================
// Password Reset
// ============================================================================

/// POST /api/auth/forgot-password
pub async fn forgot_password<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<ForgotPasswordResponse>>
where
    R: AuthStore,
{
    let use_case = ForgotPasswordUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.events.clone(),
        state.config.clone(),
    );

    let output = use_case.execute(req.email).await?;

    Ok(Json(ForgotPasswordResponse {
        message: "Password reset instructions have been sent".to_string(),
        expires_at: output.expires_at,
    }))
}

/// POST /api/auth/reset-password
pub async fn reset_password<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
{
    let use_case = ResetPasswordUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.repo.clone(),
        state.events.clone(),
        state.config.clone(),
    );

    use_case
        .execute(ResetPasswordInput {
            token: req.token,
            new_password: req.new_password,
        })
        .await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}

// ============================================================================
// Admin
// ============================================================================

/// POST /api/auth/admin/users
pub async fn create_admin<R>(
    State(state): State<AuthAppState<R>>,
    principal: Principal,
    Json(req): Json<CreateAdminRequest>,
) -> AuthResult<(StatusCode, Json<CreateAdminResponse>)>
where
    R: AuthStore,
{
    principal.require(Permission::AdminCreate)?;

    let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(code) => code.parse::<UserRole>()?,
        None => UserRole::Admin,
    };

    let use_case =
        CreateAdminUseCase::new(state.repo.clone(), state.events.clone(), state.config.clone());
    let (admin, totp) = use_case
        .execute(CreateAdminInput {
            creator_id: principal.user.id,
            name: req.name,
            email: req.email,
            password: req.password,
            phone: req.phone,
            role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAdminResponse {
            admin: UserResponse::from(&admin),
            totp: (&totp).into(),
        }),
    ))
}

/// GET /api/auth/admin/users
pub async fn list_users<R>(
    State(state): State<AuthAppState<R>>,
    principal: Principal,
    Query(params): Query<ListUsersParams>,
) -> AuthResult<Json<ListUsersResponse>>
where
    R: AuthStore,
{
    principal.require(Permission::UserRead)?;

    let role = params
        .role
        .as_deref()
        .map(str::parse::<UserRole>)
        .transpose()?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<UserStatus>)
        .transpose()?;
    let query = ListUsersQuery::new(params.page, params.limit, role, status);

    let output = ListUsersUseCase::new(state.repo.clone(), state.config.clone())
        .execute(query)
        .await?;

    Ok(Json(ListUsersResponse {
        users: output.users.iter().map(UserResponse::from).collect(),
        pagination: output.pagination.into(),
    }))
}

/// GET /api/auth/admin/users/lookup
pub async fn lookup_user<R>(
    State(state): State<AuthAppState<R>>,
    principal: Principal,
    Query(params): Query<LookupUserParams>,
) -> AuthResult<Json<UserResponse>>
where
    R: AuthStore,
{
    principal.require(Permission::UserRead)?;

    let lookup = match (params.id, params.email, params.name) {
        (Some(id), None, None) => UserLookup::Id(parse_user_id(&id)?),
        (None, Some(email), None) => UserLookup::Email(email),
        (None, None, Some(name)) => UserLookup::Name(name),
        _ => {
            return Err(AuthError::Validation(
                "Exactly one of id, email or name is required".into(),
            ));
        }
    };

    let user = LookupUserUseCase::new(state.repo.clone(), state.config.clone())
        .execute(lookup)
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// PUT /api/auth/admin/users/{id}/role
pub async fn update_user_role<R>(
    State(state): State<AuthAppState<R>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: AuthStore,
{
    principal.require(Permission::UserUpdate)?;

    let use_case =
        UpdateUserRoleUseCase::new(state.repo.clone(), state.events.clone(), state.config.clone());
    let user = use_case
        .execute(UpdateUserRoleInput {
            user_id: parse_user_id(&id)?,
            new_role: req.role.parse()?,
            updated_by: principal.user.id,
        })
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// PUT /api/auth/admin/users/{id}/status
pub async fn update_user_status<R>(
    State(state): State<AuthAppState<R>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: AuthStore,
{
    principal.require(Permission::UserUpdate)?;

    let use_case = DeactivateUserUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.events.clone(),
        state.config.clone(),
    );
    let user = use_case
        .execute(DeactivateUserInput {
            user_id: parse_user_id(&id)?,
            new_status: req.status.parse()?,
            reason: req.reason,
            updated_by: principal.user.id,
        })
        .await?;

    Ok(Json(UserResponse::from(&user)))
}
