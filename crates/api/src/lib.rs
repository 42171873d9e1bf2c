//! HTTP API layer for quill.
//!
//! This crate provides the REST routers for both services:
//!
//! - **Endpoints**: blog-service resources under `/api/v1`
//! - **Email**: the email-service magic link API under `/api/v1/email`
//! - **Extractors**: authenticated user, optional user
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod email;
pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use email::{EmailState, router as email_router};
pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
