//! seal.codes server library - signing and verification services
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedCaller, IdentityResolver, JwtIdentityResolver};
pub use config::{Config, ConfigError, Environment};
pub use db::PostgresKeyRegistry;
pub use error::ApiError;
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_config};
pub use state::{AppState, SharedRegistry};
