//! Cycle outcomes.

use std::fmt;
use std::sync::Arc;

use tsgen_core::Fingerprint;

use crate::error::CycleError;

/// Why a cycle did not call the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The stored fingerprint matches the current schema.
    Unchanged,
}

impl SkipReason {
    /// Returns the reason code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one regeneration cycle.
///
/// Cheap to clone so it can be broadcast to several subscribers.
///
/// # Examples
///
/// ```
/// use tsgen_core::Fingerprint;
/// use tsgen_regen::{GenerationOutcome, SkipReason};
///
/// let fingerprint = Fingerprint::of_bytes(b"{}");
/// let outcome = GenerationOutcome::Skipped {
///     reason: SkipReason::Unchanged,
///     fingerprint,
/// };
/// assert_eq!(outcome.reason_code(), "unchanged");
/// assert!(!outcome.is_failure());
/// ```
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// The generator was not called.
    Skipped {
        /// Why.
        reason: SkipReason,
        /// Fingerprint of the current schema.
        fingerprint: Fingerprint,
    },
    /// A client was generated and its fingerprint stored.
    Succeeded {
        /// The stored fingerprint.
        fingerprint: Fingerprint,
    },
    /// The cycle stopped early.
    Failed(Arc<CycleError>),
}

impl GenerationOutcome {
    /// Returns the machine-readable reason code.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Skipped { reason, .. } => reason.as_str(),
            Self::Succeeded { .. } => "generated",
            Self::Failed(error) => error.reason_code(),
        }
    }

    /// Returns `true` for [`GenerationOutcome::Failed`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the schema fingerprint, unless the cycle failed.
    #[must_use]
    pub const fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Self::Skipped { fingerprint, .. } | Self::Succeeded { fingerprint } => Some(fingerprint),
            Self::Failed(_) => None,
        }
    }

    /// Returns the error, if the cycle failed.
    #[must_use]
    pub fn error(&self) -> Option<&CycleError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Returns a one-line, human-readable summary.
    #[must_use]
    pub fn status_line(&self) -> String {
        match self {
            Self::Skipped { fingerprint, .. } => {
                format!("Schema unchanged ({}), skipping generation", fingerprint.short())
            }
            Self::Succeeded { fingerprint } => {
                format!("Client generated ({})", fingerprint.short())
            }
            Self::Failed(error) => format!("Generation failed while {}: {error}", error.stage()),
        }
    }
}

impl From<CycleError> for GenerationOutcome {
    fn from(error: CycleError) -> Self {
        Self::Failed(Arc::new(error))
    }
}

impl fmt::Display for GenerationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}
