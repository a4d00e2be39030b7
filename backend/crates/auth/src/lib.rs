//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits, token and TOTP services
//! - `application/` - Use cases (register, login, refresh, validate, logout,
//!   password reset, admin directory management)
//! - `infra/` - PostgreSQL and in-memory stores
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - Registration and login with email + password, optional TOTP
//! - Short-lived HS256 access tokens, rotating opaque refresh tokens
//! - Single-use password reset tokens
//! - Role-based permissions (User, Admin, SuperAdmin) derived at read time
//!
//! ## Security Model
//! - Passwords hashed with Argon2id on the blocking pool
//! - Refresh and reset tokens stored as SHA-256 digests only
//! - Refresh rotation is one atomic compare-and-swap per token
//! - Every token validation re-reads the user, so suspension is immediate

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::events::{EventPublisher, TracingEventPublisher};
pub use domain::services::{SigningKey, TokenSigner};
pub use error::{AuthError, AuthResult};
pub use infra::{memory::InMemoryAuthRepository, postgres::PgAuthRepository};
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

mod tests;
