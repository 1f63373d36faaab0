//! # NNS Watch Runtime
//!
//! Connects the watch core to the outside world.
//!
//! ## Modules
//!
//! - `config` - Layered `RuntimeConfig` (defaults, settings file, env, CLI)
//! - `adapters` - HTTP proposal feed and Telegram bot
//! - `metrics_server` - `/metrics` and `/health`
//! - `runtime` - `WatchRuntime`, worker lifecycle and graceful shutdown
//!
//! ## Process Layout
//!
//! ```text
//!   proposal feed ──poll──→ PollWorker ──notify──→ Telegram
//!                               │
//!                         WatchState ←──commands── CommandWorker ←── getUpdates
//!                               │
//!                     PersistenceWorker ──atomic write──→ state.json
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod metrics_server;
pub mod runtime;

pub use config::{CliOverrides, ConfigError, RuntimeConfig};
pub use runtime::{Adapters, WatchRuntime};
