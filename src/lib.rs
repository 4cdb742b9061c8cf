//! # agent-vault
//!
//! Local-first credential broker for AI agent runtimes.
//!
//! Provider metadata lives in a JSON manifest; provider secrets live in the
//! OS keyring (or an encrypted file). Nothing secret is ever written to the
//! manifest or a log line.
//!
//! ## Architecture
//!
//! ```text
//!     CLI (clap)          HTTP API + dashboard (axum)
//!          │                        │
//!          └──────────┬─────────────┘
//!                     ▼
//!            ┌──────────────────┐
//!            │ AgentVaultService│
//!            └───────┬──────────┘
//!        ┌───────────┼───────────┬──────────────┐
//!        ▼           ▼           ▼              ▼
//!    manifest     policy      vault          probe
//!   (JSON file) (selection) (SecretStore) (TCP connect)
//! ```
//!
//! ## Run flow
//! 1. Load the manifest
//! 2. Select a provider (explicit override or best-ranked)
//! 3. Pull its secret from the store into an env overlay
//! 4. Spawn the command with the overlay on top of the ambient env
//!
//! ## Modules
//! - `manifest`: Provider registry model, validation, atomic persistence
//! - `policy`: Provider ranking and selection
//! - `vault`: Secret store trait and backends
//! - `probe`: Endpoint reachability checks
//! - `service`: Orchestration façade used by both frontends
//! - `runner`: Command parsing and execution
//! - `api`: Local HTTP API and dashboard
//! - `cli`: Command-line frontend

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod policy;
pub mod probe;
pub mod runner;
pub mod service;
pub mod util;
pub mod vault;

pub use config::Config;
pub use error::{Error, Result};
pub use service::AgentVaultService;
