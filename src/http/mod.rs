//! HTTP edge of the service: routing, middleware and handlers.

pub mod admission;
pub mod auth;
pub mod cors;
pub mod extract;
pub mod handlers;
pub mod problem;
pub mod security;
mod server;
mod state;

pub use auth::{AuthenticatedUser, Identity, JwtAuthenticator};
pub use problem::ApiError;
pub use server::{router, HttpServer};
pub use state::AppState;
