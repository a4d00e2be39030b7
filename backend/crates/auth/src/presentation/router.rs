//! Auth Router

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;

use crate::application::{EventPublisher, config::AuthConfig};
use crate::domain::repository::AuthStore;
use crate::domain::services::TokenSigner;
use crate::presentation::handlers::{self, AuthAppState};

/// Create the Auth router for any store implementation
///
/// Paths are relative; the binary nests them under `/api/auth`.
pub fn auth_router<R>(
    repo: R,
    config: AuthConfig,
    signer: Arc<TokenSigner>,
    events: Arc<dyn EventPublisher>,
) -> Router
where
    R: AuthStore,
{
    let state = AuthAppState {
        repo: Arc::new(repo),
        config: Arc::new(config),
        signer,
        events,
    };

    Router::new()
        .route("/register", post(handlers::register::<R>))
        .route("/login", post(handlers::login::<R>))
        .route("/admin/login", post(handlers::admin_login::<R>))
        .route("/refresh", post(handlers::refresh::<R>))
        .route("/validate", post(handlers::validate::<R>))
        .route("/logout", post(handlers::logout::<R>))
        .route("/forgot-password", post(handlers::forgot_password::<R>))
        .route("/reset-password", post(handlers::reset_password::<R>))
        .route(
            "/admin/users",
            post(handlers::create_admin::<R>).get(handlers::list_users::<R>),
        )
        .route("/admin/users/lookup", get(handlers::lookup_user::<R>))
        .route("/admin/users/{id}/role", put(handlers::update_user_role::<R>))
        .route(
            "/admin/users/{id}/status",
            put(handlers::update_user_status::<R>),
        )
        .with_state(state)
}
