//! Error types for the tsgen-core crate.
//!
//! This module provides the error types raised by the pieces of the pipeline
//! that live in this crate:
//!
//! - [`ConfigError`] - configuration loading and validation
//! - [`SchemaError`] - structural validation of a schema document
//! - [`SerializationError`] - canonical serialization for fingerprinting
//! - [`StoreError`] - reading or writing the persisted fingerprint

use camino::Utf8PathBuf;
use smallvec::SmallVec;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use tsgen_core::ConfigError;
///
/// let error = ConfigError::MissingOption("schema_provider");
/// assert!(error.to_string().contains("schema_provider"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration option was not provided.
    #[error("missing required configuration option '{0}'")]
    MissingOption(&'static str),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// The configuration file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`Config`](crate::Config).
    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        /// The configuration file path.
        path: Utf8PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

/// A schema document failed structural validation.
///
/// Validation failures never touch the fingerprint store; they are reported
/// as a failed cycle and the next triggering event tries again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The document root is not a mapping.
    #[error("invalid OpenAPI schema: expected an object at the root, found {found}")]
    NotAnObject {
        /// The JSON type found at the root.
        found: &'static str,
    },

    /// One or more required top-level fields are absent.
    #[error("invalid OpenAPI schema: missing required fields: {}", .0.join(", "))]
    MissingFields(SmallVec<[&'static str; 4]>),

    /// The `info` object has no string `title`.
    #[error("invalid OpenAPI schema: 'info' must contain 'title'")]
    MissingTitle,

    /// The `paths` object is not a mapping or registers no operations.
    #[error("invalid OpenAPI schema: 'paths' must register at least one operation")]
    NoPaths,
}

/// A schema document could not be turned into canonical bytes.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// The document nests deeper than the canonical encoder accepts.
    #[error("schema nesting exceeds the maximum depth of {max}")]
    TooDeep {
        /// The configured maximum depth.
        max: usize,
    },

    /// The value contains something outside the JSON data model.
    #[error("schema is not representable as JSON: {0}")]
    Unrepresentable(#[from] serde_json::Error),
}

/// Errors raised by the fingerprint store.
///
/// A missing store file is **not** an error; it is reported as `None` by
/// [`load`](crate::load). Everything else, including permission problems and
/// a directory sitting where the file should be, surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store file exists but could not be read.
    #[error("failed to read fingerprint store {path}: {source}")]
    Read {
        /// Path of the store file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store file could not be written.
    #[error("failed to write fingerprint store {path}: {source}")]
    Write {
        /// Path of the store file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Creates a new [`StoreError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`StoreError::Write`] error.
    #[inline]
    pub fn write(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Returns the store path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } => path,
        }
    }

    /// Returns `true` if this error happened while reading.
    #[inline]
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}
