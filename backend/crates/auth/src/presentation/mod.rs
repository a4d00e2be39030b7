//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and bearer authentication.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AuthAppState;
pub use middleware::{Principal, bearer_token};
pub use router::auth_router;
