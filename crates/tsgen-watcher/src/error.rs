//! Error types for the tsgen-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while setting up or running the source watcher.

use camino::Utf8PathBuf;

/// Errors that can occur during file watching operations.
///
/// # Error Recovery Strategy
///
/// - **Notify errors** ([`WatchError::Notify`]): Fatal - propagate immediately
/// - **Path not found** ([`WatchError::PathNotFound`]): Fatal - every root must exist
/// - **No paths** ([`WatchError::NoPaths`]): Fatal - nothing to watch
/// - **Invalid pattern** ([`WatchError::InvalidPattern`]): Fatal - fix the configuration
/// - **Channel closed** ([`WatchError::ChannelClosed`]): Fatal - communication broken
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): Recoverable - skip and continue
/// - **I/O errors** ([`WatchError::Io`]): Fatal - propagate immediately
///
/// # Examples
///
/// ```
/// use tsgen_watcher::WatchError;
///
/// fn handle_error(err: &WatchError) {
///     if err.is_fatal() {
///         eprintln!("watcher stopped: {err}");
///     } else {
///         eprintln!("skipping event: {err}");
///     }
/// }
/// # handle_error(&WatchError::ChannelClosed);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A watch root does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The configuration lists no roots to watch.
    #[error("no paths configured to watch")]
    NoPaths,

    /// An ignore pattern could not be compiled.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern as configured.
        pattern: String,
        /// The underlying glob error.
        #[source]
        source: ignore::Error,
    },

    /// The event channel was closed unexpectedly.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,

    /// A path is not valid UTF-8.
    ///
    /// Events for such paths are logged and skipped.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred while resolving a watch root.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Creates a new [`WatchError::InvalidPattern`] error.
    #[inline]
    pub fn invalid_pattern(pattern: impl Into<String>, source: ignore::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_))
    }

    /// Returns `true` if this error is fatal (watching should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) => Some(path),
            Self::Notify(_)
            | Self::NoPaths
            | Self::InvalidPattern { .. }
            | Self::ChannelClosed
            | Self::NonUtf8Path(_)
            | Self::Io(_) => None,
        }
    }
}
