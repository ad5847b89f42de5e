//! aptiq-core: Question bank, sampling, scoring, and timed quiz sessions.
//!
//! This crate holds the whole quiz engine. Persistence is reached only
//! through the [`storage::StorageBackend`] trait; the SQLite backend and
//! configuration live in `aptiq-store`.

pub mod archive;
pub mod bank;
pub mod clock;
pub mod driver;
pub mod error;
pub mod memory;
pub mod model;
pub mod sampler;
pub mod scoring;
pub mod service;
pub mod session;
pub mod statistics;
pub mod storage;
pub mod store;
