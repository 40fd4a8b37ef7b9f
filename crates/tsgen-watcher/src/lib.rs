//! Source watcher producing triggering events for schema regeneration.
//!
//! This crate detects changes to backend source files via the `notify` crate,
//! groups each raw burst through `notify-debouncer-mini`, filters out paths
//! that cannot affect the schema, and streams the remaining changes to async
//! code as [`FileEventBatch`]es.
//!
//! Every batch is one triggering event. The regeneration controller does the
//! real debouncing, so the watcher's batch window (`batch_ms`) can stay short.
//!
//! # Crate Dependencies
//!
//! ```text
//! tsgen-cli ──► tsgen-regen ──► tsgen-core
//!           └─► tsgen-watcher ─────────►
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use camino::Utf8Path;
//! use tsgen_core::WatchConfig;
//! use tsgen_watcher::{FileWatcher, watch_filter};
//!
//! # async fn example() -> Result<(), tsgen_watcher::WatchError> {
//! let config = WatchConfig::default();
//! let filter = watch_filter(&config, Utf8Path::new("."), &["frontend/src/api".into()])?;
//! let mut watcher = FileWatcher::new(&config, filter)?;
//!
//! while let Some(batch) = watcher.recv().await {
//!     for path in batch.unique_paths() {
//!         println!("changed: {path}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! ```
//! use tsgen_watcher::WatchError;
//!
//! fn handle_watch_error(err: WatchError) {
//!     if err.is_fatal() {
//!         eprintln!("Fatal watcher error: {err}");
//!     } else {
//!         eprintln!("Warning: {err}");
//!     }
//! }
//! # handle_watch_error(WatchError::NoPaths);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{FileEvent, FileEventBatch};

// Re-export filter types
pub use filter::{
    AcceptAllFilter, CompositeFilter, ExcludeDirFilter, ExtensionFilter, FileFilter, IgnoreFilter,
    watch_filter,
};

// Re-export watcher types
pub use watcher::FileWatcher;
