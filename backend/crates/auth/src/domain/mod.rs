//! Domain Layer
//!
//! Contains entities, value objects, repository traits and the stateless
//! credential services.

pub mod entity;
pub mod repository;
pub mod services;
pub mod value_object;

// Re-exports
pub use entity::{NewUser, PasswordResetToken, RefreshToken, User};
pub use repository::{
    AuthStore, ListUsersQuery, PasswordResetTokenRepository, RefreshTokenRepository,
    UserRepository,
};
pub use services::{Claims, SigningKey, TokenSigner, TotpManager};
