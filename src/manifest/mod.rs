//! Provider manifest: model, validation, and on-disk persistence.
//!
//! ```text
//! {
//!   "version": "2026.1",
//!   "identity": "primary-dev-node",
//!   "providers": {
//!     "openai_pro": {
//!       "type": "upstream",
//!       "vault_key": "api.openai.com/pro_key",
//!       "env_var": "OPENAI_API_KEY",
//!       "priority": 1
//!     }
//!   }
//! }
//! ```
//!
//! Secrets never live here; `vault_key` only names the secret-store entry.

pub mod store;
mod types;

pub use types::*;
