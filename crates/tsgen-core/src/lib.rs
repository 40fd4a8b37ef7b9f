//! Core types, errors, and utilities for the tsgen tool.
//!
//! This crate provides the pieces of the regeneration pipeline that have no
//! knowledge of processes, timers, or file watching:
//!
//! - [`SchemaDocument`] and its structural validation
//! - The fingerprint engine ([`fingerprint`], [`canonical_json`])
//! - The persisted fingerprint store ([`FingerprintStore`], [`FileStore`])
//! - Configuration structures ([`Config`])
//! - Error types shared across the workspace
//!
//! # Crate Dependencies
//!
//! ```text
//! tsgen-cli ──► tsgen-regen ──► tsgen-core
//!           └─► tsgen-watcher ─────────►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod canonical;
pub mod config;
pub mod error;
pub mod schema;
pub mod store;
pub mod types;

pub use canonical::{MAX_DEPTH, canonical_json, canonical_json_bytes, fingerprint};
pub use config::{Config, DEFAULT_CONFIG_FILE, GeneratorConfig, WatchConfig};
pub use error::{ConfigError, SchemaError, SerializationError, StoreError};
pub use schema::SchemaDocument;
pub use store::{FileStore, FingerprintStore, STORE_FILE_NAME, load, save};
pub use types::{ClientFormat, Fingerprint, UnknownFormat};
