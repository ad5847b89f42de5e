//! aptiq-store: Storage backends and configuration.
//!
//! Implements the core `StorageBackend` trait on SQLite, loads the
//! `aptiq.toml` configuration, and builds the configured backend.

pub mod config;
pub mod sqlite;

pub use aptiq_core::memory::MemoryBackend;
pub use config::{load_config_from, open_backend, AptiqConfig, BackendKind};
pub use sqlite::SqliteBackend;
