//! Generated client formats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The flavour of TypeScript client to generate.
///
/// Each variant maps to one `openapi-generator` generator name.
///
/// # Examples
///
/// ```
/// use tsgen_core::ClientFormat;
///
/// assert_eq!(ClientFormat::default(), ClientFormat::Fetch);
/// assert_eq!(ClientFormat::Angular.generator_name(), "typescript-angular");
/// assert_eq!("axios".parse::<ClientFormat>(), Ok(ClientFormat::Axios));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientFormat {
    /// Client built on the Fetch API.
    #[default]
    Fetch,
    /// Client built on axios.
    Axios,
    /// Angular services built on `HttpClient`.
    Angular,
}

impl ClientFormat {
    /// All formats, in declaration order.
    pub const ALL: [Self; 3] = [Self::Fetch, Self::Axios, Self::Angular];

    /// Returns the `openapi-generator` generator name for this format.
    #[inline]
    #[must_use]
    pub const fn generator_name(self) -> &'static str {
        match self {
            Self::Fetch => "typescript-fetch",
            Self::Axios => "typescript-axios",
            Self::Angular => "typescript-angular",
        }
    }

    /// Returns the short configuration label for this format.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Axios => "axios",
            Self::Angular => "angular",
        }
    }
}

impl fmt::Display for ClientFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown [`ClientFormat`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown client format '{0}' (expected fetch, axios or angular)")]
pub struct UnknownFormat(String);

impl FromStr for ClientFormat {
    type Err = UnknownFormat;

    /// Accepts both the short label and the full generator name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.label() == wanted || format.generator_name() == wanted)
            .ok_or(UnknownFormat(wanted))
    }
}
