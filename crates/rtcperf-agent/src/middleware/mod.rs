//! HTTP middleware for the agent's ingestion endpoint.

pub mod auth;

pub use auth::{basic_auth_middleware, BasicAuthState};
