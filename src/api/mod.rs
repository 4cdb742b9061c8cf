//! Local HTTP API and dashboard.
//!
//! ## Endpoints
//!
//! - `GET /` - Dashboard page
//! - `GET /health` - Health check
//! - `GET /providers` - Provider statuses, best-ranked first
//! - `POST /providers/:name/secret` - Store or rotate a provider secret (token)
//! - `DELETE /providers/:name/secret` - Delete a provider secret (token)
//! - `POST /providers/:name/test` - Check secret presence and reachability
//! - `GET /manifest` - Current manifest
//! - `PUT /manifest` - Replace the manifest (token)
//!
//! Endpoints marked "token" require the shared dashboard token in
//! `X-Agent-Vault-Token` or `Authorization: Bearer <token>`.

mod auth;
mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;

#[cfg(test)]
mod tests;
