//! Configuration structures for the tsgen tool.
//!
//! This module provides configuration types for all components of the
//! application:
//!
//! - [`Config`] - Root configuration: provider, output, debounce, format
//! - [`GeneratorConfig`] - How the external client generator is invoked
//! - [`WatchConfig`] - Which files trigger a regeneration check
//!
//! Configuration is read from a JSON file (`tsgen.json` by default). Every
//! section is `#[serde(default)]`, so a file only needs the keys it changes:
//!
//! ```json
//! {
//!   "schema_provider": "cmd:python manage.py export_openapi_schema --api api.urls.api",
//!   "output_dir": "../frontend/src/app/api",
//!   "format": "angular"
//! }
//! ```

use std::time::Duration;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ClientFormat;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tsgen.json";

/// Configuration for invoking the external client generator.
///
/// # Examples
///
/// ```
/// use tsgen_core::GeneratorConfig;
///
/// let config = GeneratorConfig::default();
/// assert_eq!(config.command, vec!["npx", "openapi-generator-cli"]);
/// assert_eq!(config.timeout_seconds, 120.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Program and leading arguments used to launch the generator.
    pub command: Vec<String>,

    /// Extra arguments appended after the generator name.
    pub extra_args: Vec<String>,

    /// Upper bound on a single generator run, in seconds.
    pub timeout_seconds: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["npx".to_owned(), "openapi-generator-cli".to_owned()],
            extra_args: vec!["-p".to_owned(), "removeOperationIdPrefix=true".to_owned()],
            timeout_seconds: 120.0,
        }
    }
}

/// Configuration for the file watcher that produces triggering events.
///
/// # Examples
///
/// ```
/// use tsgen_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.batch_ms, 100);
/// assert_eq!(config.extensions, vec!["py"]);
/// assert!(config.recursive);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Roots to watch for changes.
    pub paths: Vec<Utf8PathBuf>,

    /// File extensions (without the leading dot) that count as relevant.
    pub extensions: Vec<String>,

    /// Gitignore-style patterns for paths that never trigger.
    pub ignore_patterns: Vec<String>,

    /// Window in milliseconds used to batch raw filesystem events.
    ///
    /// This only groups the notifier's own event storm; the quiet period
    /// that decides when to regenerate is [`Config::debounce_seconds`].
    pub batch_ms: u64,

    /// Whether to watch subdirectories recursively.
    pub recursive: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: vec![Utf8PathBuf::from(".")],
            extensions: vec!["py".to_owned()],
            ignore_patterns: vec![
                "__pycache__".to_owned(),
                ".git".to_owned(),
                "node_modules".to_owned(),
                ".venv".to_owned(),
            ],
            batch_ms: 100,
            recursive: true,
        }
    }
}

/// Root configuration for the tsgen tool.
///
/// # Examples
///
/// ```
/// use tsgen_core::{ClientFormat, Config};
///
/// let config = Config::default();
/// assert_eq!(config.debounce_seconds, 1.0);
/// assert_eq!(config.format, ClientFormat::Fetch);
/// assert!(config.clean_before_generate);
/// assert!(config.auto_generate);
///
/// // Provider and output directory have no sensible default.
/// assert!(config.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identifier resolved to the schema provider (`file:…`, `cmd:…`, or a path).
    pub schema_provider: String,

    /// Directory receiving the generated client and the fingerprint store.
    pub output_dir: Utf8PathBuf,

    /// Quiet period, in seconds, before a burst of triggers settles.
    pub debounce_seconds: f64,

    /// Flavour of TypeScript client to generate.
    pub format: ClientFormat,

    /// Remove the previous client before generating a new one.
    pub clean_before_generate: bool,

    /// React to triggering events; when `false` only explicit runs generate.
    pub auto_generate: bool,

    /// External generator settings.
    pub generator: GeneratorConfig,

    /// File watcher settings.
    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_provider: String::new(),
            output_dir: Utf8PathBuf::new(),
            debounce_seconds: 1.0,
            format: ClientFormat::default(),
            clean_before_generate: true,
            auto_generate: true,
            generator: GeneratorConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid configuration JSON.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Loads `path` if given, otherwise `tsgen.json` from `base_dir` if it
    /// exists, otherwise returns the defaults.
    pub fn discover(path: Option<&Utf8Path>, base_dir: &Utf8Path) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let candidate = base_dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Checks that required options are present and values are in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_provider.trim().is_empty() {
            return Err(ConfigError::MissingOption("schema_provider"));
        }
        if self.output_dir.as_str().trim().is_empty() {
            return Err(ConfigError::MissingOption("output_dir"));
        }
        if !self.debounce_seconds.is_finite() || self.debounce_seconds < 0.0 {
            return Err(ConfigError::invalid(
                "debounce_seconds",
                format!("must be a finite number >= 0, got {}", self.debounce_seconds),
            ));
        }
        if !self.generator.timeout_seconds.is_finite() || self.generator.timeout_seconds <= 0.0 {
            return Err(ConfigError::invalid(
                "generator.timeout_seconds",
                format!(
                    "must be a finite number > 0, got {}",
                    self.generator.timeout_seconds
                ),
            ));
        }
        if self.generator.command.is_empty() {
            return Err(ConfigError::invalid(
                "generator.command",
                "must name a program to run",
            ));
        }
        Ok(())
    }

    /// Checks that cleaning `output_dir` cannot delete the project.
    ///
    /// Relative paths are taken against `base_dir`. The output directory may
    /// not be `base_dir`, a watched root, the directory holding
    /// `config_file`, or any ancestor of those.
    pub fn validate_paths(
        &self,
        base_dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<(), ConfigError> {
        let output_dir = normalize(&base_dir.join(&self.output_dir));

        let mut guarded = vec![("the project directory", base_dir.to_owned())];
        guarded.extend(
            self.watch
                .paths
                .iter()
                .map(|path| ("watched path", base_dir.join(path))),
        );
        if let Some(file) = config_file {
            guarded.push(("the configuration file", base_dir.join(file)));
        }

        for (what, path) in guarded {
            if normalize(&path).starts_with(&output_dir) {
                return Err(ConfigError::invalid(
                    "output_dir",
                    format!("{output_dir} contains {what} {path}, which cleaning would delete"),
                ));
            }
        }
        Ok(())
    }

    /// Returns the debounce quiet period.
    ///
    /// Out-of-range values (rejected by [`validate`](Self::validate)) map to
    /// zero.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::try_from_secs_f64(self.debounce_seconds).unwrap_or(Duration::ZERO)
    }

    /// Returns the upper bound for one generator run.
    #[must_use]
    pub fn generator_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.generator.timeout_seconds)
            .unwrap_or(Duration::from_secs(120))
    }
}

/// Resolves symlinks in the longest existing prefix of `path` and folds `.`
/// and `..` in the rest.
fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let existing = path
        .ancestors()
        .find_map(|ancestor| Some((ancestor, ancestor.canonicalize_utf8().ok()?)));

    let (mut normalized, rest) = match existing {
        Some((ancestor, canonical)) => (
            canonical,
            path.strip_prefix(ancestor).unwrap_or(Utf8Path::new("")),
        ),
        None => (Utf8PathBuf::new(), path),
    };

    for component in rest.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_str()),
        }
    }
    normalized
}
