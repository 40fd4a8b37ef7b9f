//! Error types for the tsgen-regen crate.
//!
//! - [`ProviderError`] - resolving a provider identifier or extracting a schema
//! - [`GeneratorError`] - invoking the external client generator
//! - [`CycleError`] - the one error a regeneration cycle can end with
//!
//! A [`CycleError`] is never fatal to the host: the cycle reports
//! [`GenerationOutcome::Failed`](crate::GenerationOutcome::Failed) and the
//! next triggering event tries again.

use std::fmt;
use std::time::Duration;

use tsgen_core::{ClientFormat, SchemaError, SerializationError, StoreError};

/// Longest stretch of generator stderr carried in an error message.
pub const MAX_STDERR_CHARS: usize = 500;

/// Errors raised while turning a provider identifier into a schema.
///
/// The three variants mirror the three ways a lookup goes wrong: nothing
/// answers to the name, something answers but cannot produce a schema, or it
/// tried and failed.
///
/// # Examples
///
/// ```
/// use tsgen_regen::ProviderError;
///
/// let err = ProviderError::unresolved("cmd:missing-tool", "program not found on PATH");
/// assert_eq!(err.identifier(), "cmd:missing-tool");
/// assert!(err.to_string().contains("does not resolve"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The identifier does not name anything.
    #[error("schema provider '{identifier}' does not resolve: {reason}")]
    Unresolved {
        /// The configured identifier.
        identifier: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The identifier names something that cannot supply a schema.
    #[error("schema provider '{identifier}' cannot supply a schema: {reason}")]
    MissingCapability {
        /// The configured identifier.
        identifier: String,
        /// What is missing.
        reason: String,
    },

    /// The provider ran but did not produce a schema document.
    #[error("schema provider '{identifier}' failed to produce a schema: {reason}")]
    Extraction {
        /// The configured identifier.
        identifier: String,
        /// What went wrong.
        reason: String,
    },
}

impl ProviderError {
    /// Creates a new [`ProviderError::Unresolved`] error.
    pub fn unresolved(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unresolved {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ProviderError::MissingCapability`] error.
    pub fn missing_capability(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingCapability {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ProviderError::Extraction`] error.
    pub fn extraction(identifier: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Extraction {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns the identifier the error is about.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Unresolved { identifier, .. }
            | Self::MissingCapability { identifier, .. }
            | Self::Extraction { identifier, .. } => identifier,
        }
    }
}

/// Errors raised by a client generator.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// The generator rejected the schema.
    #[error("generator rejected the schema: {message}")]
    InvalidSpec {
        /// Generator diagnostics, truncated to [`MAX_STDERR_CHARS`].
        message: String,
    },

    /// The generator does not know the requested client format.
    #[error("generator does not support format '{format}' ({})", .format.generator_name())]
    UnsupportedFormat {
        /// The requested format.
        format: ClientFormat,
    },

    /// The generator could not be run, or its files could not be handled.
    #[error("generator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeneratorError {
    /// Creates an [`GeneratorError::InvalidSpec`] from raw stderr, truncating
    /// it to [`MAX_STDERR_CHARS`] characters.
    pub fn invalid_spec(stderr: &str) -> Self {
        let trimmed = stderr.trim();
        let message = match trimmed.char_indices().nth(MAX_STDERR_CHARS) {
            Some((cut, _)) => format!("{}…", &trimmed[..cut]),
            None => trimmed.to_owned(),
        };
        Self::InvalidSpec { message }
    }
}

/// The step of a regeneration cycle an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolving the provider and obtaining the document.
    Fetching,
    /// Structural schema checks.
    Validating,
    /// Canonical serialization and hashing.
    Fingerprinting,
    /// Reading the stored fingerprint.
    Comparing,
    /// Running the client generator.
    Generating,
    /// Writing the new fingerprint.
    Persisting,
    /// Anywhere in the cycle, when the stage is unknown.
    Running,
}

impl Stage {
    /// Returns the lowercase stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Validating => "validating",
            Self::Fingerprinting => "fingerprinting",
            Self::Comparing => "comparing",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a regeneration cycle failed.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// The schema could not be obtained.
    #[error(transparent)]
    ProviderResolution(#[from] ProviderError),

    /// The schema failed structural validation.
    #[error(transparent)]
    InvalidSchema(#[from] SchemaError),

    /// The schema could not be canonicalized.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The stored fingerprint could not be read.
    #[error(transparent)]
    StoreRead(StoreError),

    /// The new fingerprint could not be stored. The client was generated.
    #[error("{0} (the client was generated but will be regenerated next time)")]
    StoreWrite(StoreError),

    /// The generator failed.
    #[error("client generation failed: {0}")]
    GeneratorInvocation(#[from] GeneratorError),

    /// The generator did not finish in time and was killed.
    #[error("client generation timed out after {} seconds", .after.as_secs_f64())]
    Timeout {
        /// The configured limit.
        after: Duration,
    },

    /// The cycle task panicked, typically inside an injected collaborator.
    #[error("regeneration cycle panicked: {message}")]
    Panicked {
        /// The panic description.
        message: String,
    },
}

impl From<StoreError> for CycleError {
    fn from(error: StoreError) -> Self {
        if error.is_read() {
            Self::StoreRead(error)
        } else {
            Self::StoreWrite(error)
        }
    }
}

impl CycleError {
    /// Returns the machine-readable reason code.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::ProviderResolution(_) => "provider_resolution",
            Self::InvalidSchema(_) => "invalid_schema",
            Self::Serialization(_) => "serialization",
            Self::StoreRead(_) => "store_read",
            Self::StoreWrite(_) => "store_write",
            Self::GeneratorInvocation(_) => "generator_invocation",
            Self::Timeout { .. } => "timeout",
            Self::Panicked { .. } => "panicked",
        }
    }

    /// Returns the cycle stage that failed.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::ProviderResolution(_) => Stage::Fetching,
            Self::InvalidSchema(_) => Stage::Validating,
            Self::Serialization(_) => Stage::Fingerprinting,
            Self::StoreRead(_) => Stage::Comparing,
            Self::GeneratorInvocation(_) | Self::Timeout { .. } => Stage::Generating,
            Self::StoreWrite(_) => Stage::Persisting,
            Self::Panicked { .. } => Stage::Running,
        }
    }
}
