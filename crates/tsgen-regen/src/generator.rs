//! Client generator adapters.
//!
//! [`OpenApiGeneratorCli`] drives `openapi-generator-cli` (through `npx` by
//! default). The schema is handed over in a temporary `.json` file that lives
//! exactly as long as the generator run.
//!
//! The generator writes into a staging directory next to the output
//! directory. Only a successful run touches the output directory: it is
//! cleaned (when configured) and the staged files are moved in. A failed run
//! leaves the previous client in place.

use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use camino::Utf8Path;
use tokio::process::Command;
use tracing::{debug, info, warn};

use tsgen_core::{ClientFormat, GeneratorConfig, STORE_FILE_NAME, SchemaDocument};

use crate::error::GeneratorError;
use crate::tools;

/// Marker in generator stderr for an unknown `-g` value.
const UNKNOWN_GENERATOR_MARKER: &str = "Can't load config class";

/// Name of the npm wrapper around the generator jar.
const GENERATOR_CLI: &str = "openapi-generator-cli";

/// Prefix of the staging directory created beside the output directory.
const STAGING_PREFIX: &str = ".tsgen-staging-";

/// Produces a client from a schema document.
pub trait ClientGenerator: Send + Sync {
    /// Writes a client for `schema` in `format` into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError`] if the generator rejects the schema, does
    /// not know the format, or cannot be run.
    fn generate(
        &self,
        schema: &SchemaDocument,
        format: ClientFormat,
        output_dir: &Utf8Path,
    ) -> impl Future<Output = Result<(), GeneratorError>> + Send;
}

impl<G: ClientGenerator + ?Sized> ClientGenerator for std::sync::Arc<G> {
    fn generate(
        &self,
        schema: &SchemaDocument,
        format: ClientFormat,
        output_dir: &Utf8Path,
    ) -> impl Future<Output = Result<(), GeneratorError>> + Send {
        (**self).generate(schema, format, output_dir)
    }
}

/// An external tool the generator needs but could not find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    /// Program looked up on `PATH`.
    pub program: String,
    /// Human-readable name.
    pub label: &'static str,
    /// How to install it on this platform.
    pub hint: &'static str,
}

impl std::fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ('{}') not found, install with: {}", self.label, self.program, self.hint)
    }
}

/// Runs `openapi-generator-cli generate`.
///
/// # Examples
///
/// ```
/// use tsgen_core::GeneratorConfig;
/// use tsgen_regen::OpenApiGeneratorCli;
///
/// let generator = OpenApiGeneratorCli::from_config(&GeneratorConfig::default(), true);
/// assert_eq!(generator.program(), Some("npx"));
/// assert!(generator.needs_java());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenApiGeneratorCli {
    command: Vec<String>,
    extra_args: Vec<String>,
    clean_before_generate: bool,
}

impl OpenApiGeneratorCli {
    /// Creates an adapter from the `generator` config section.
    #[must_use]
    pub fn from_config(config: &GeneratorConfig, clean_before_generate: bool) -> Self {
        Self {
            command: config.command.clone(),
            extra_args: config.extra_args.clone(),
            clean_before_generate,
        }
    }

    /// Returns the program the command starts with.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Returns `true` if the command runs the npm wrapper, which needs a
    /// local Java runtime.
    ///
    /// Wrappers such as a Docker image bring their own runtime.
    #[must_use]
    pub fn needs_java(&self) -> bool {
        self.command
            .iter()
            .take(2)
            .any(|part| Path::new(part).file_stem().is_some_and(|stem| stem == GENERATOR_CLI))
    }

    /// Reports the external tools that are not installed.
    #[must_use]
    pub fn missing_dependencies(&self) -> Vec<MissingDependency> {
        let mut required = Vec::with_capacity(2);
        if let Some(program) = self.program() {
            let stem = Path::new(program)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(program);
            let (label, hint) = match stem {
                "npx" | "node" | "npm" => ("Node.js", node_hint()),
                "java" => ("Java runtime", java_hint()),
                _ => (
                    "Generator command",
                    "install it or change generator.command in the configuration",
                ),
            };
            required.push((program.to_owned(), label, hint));
        }
        if self.needs_java() {
            required.push(("java".to_owned(), "Java runtime", java_hint()));
        }

        required
            .into_iter()
            .filter(|(program, _, _)| tools::find_executable(program).is_none())
            .map(|(program, label, hint)| MissingDependency { program, label, hint })
            .collect()
    }

    fn arguments(&self, format: ClientFormat, output_dir: &Path, schema_file: &Path) -> Vec<String> {
        let mut args: Vec<String> = self.command.iter().skip(1).cloned().collect();
        args.extend(["generate".to_owned(), "-g".to_owned(), format.generator_name().to_owned()]);
        args.extend(self.extra_args.iter().cloned());
        args.extend([
            "-o".to_owned(),
            output_dir.display().to_string(),
            "-i".to_owned(),
            schema_file.display().to_string(),
        ]);
        args
    }
}

impl ClientGenerator for OpenApiGeneratorCli {
    async fn generate(
        &self,
        schema: &SchemaDocument,
        format: ClientFormat,
        output_dir: &Utf8Path,
    ) -> Result<(), GeneratorError> {
        let Some(program) = self.program() else {
            return Err(GeneratorError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "generator command is empty",
            )));
        };

        let mut schema_file = tempfile::Builder::new()
            .prefix("tsgen-schema-")
            .suffix(".json")
            .tempfile()?;
        let bytes = schema
            .to_json_pretty()
            .map_err(|e| GeneratorError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        schema_file.write_all(&bytes)?;
        schema_file.flush()?;

        let staging = staging_dir(output_dir)?;
        let program_path = tools::find_executable(program).unwrap_or_else(|| PathBuf::from(program));
        let args = self.arguments(format, staging.path(), schema_file.path());
        info!(generator = format.generator_name(), output_dir = %output_dir, "Generating client");
        debug!(program = %program_path.display(), ?args, "Running generator");

        let output = Command::new(&program_path)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim(), "Generator output");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "Generator exited with an error");
            return if stderr.contains(UNKNOWN_GENERATOR_MARKER) {
                Err(GeneratorError::UnsupportedFormat { format })
            } else if stderr.trim().is_empty() {
                Err(GeneratorError::invalid_spec(&stdout))
            } else {
                Err(GeneratorError::invalid_spec(&stderr))
            };
        }

        let staged = staging.path().to_path_buf();
        let target = output_dir.as_std_path().to_path_buf();
        let clean = self.clean_before_generate;
        let installed = tokio::task::spawn_blocking(move || install_staged(&staged, &target, clean))
            .await
            .map_err(io::Error::other)??;
        debug!(output_dir = %output_dir, installed, "Installed generated client");

        Ok(())
    }
}

/// Creates the staging directory beside `output_dir`, so the final moves
/// stay on one filesystem.
fn staging_dir(output_dir: &Utf8Path) -> io::Result<tempfile::TempDir> {
    let parent = match output_dir.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(parent)
}

/// Replaces the client in `output_dir` with the staged one.
///
/// Returns the number of top-level entries moved.
fn install_staged(staged: &Path, output_dir: &Path, clean: bool) -> io::Result<usize> {
    if clean {
        clean_output_dir(output_dir)?;
    }
    std::fs::create_dir_all(output_dir)?;
    move_entries(staged, output_dir)
}

/// Moves every entry of `from` into `to`, merging directories that exist on
/// both sides. The fingerprint file is never overwritten.
fn move_entries(from: &Path, to: &Path) -> io::Result<usize> {
    let mut moved = 0;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_name() == STORE_FILE_NAME {
            continue;
        }

        let target = to.join(entry.file_name());
        let is_dir = entry.file_type()?.is_dir();
        match std::fs::symlink_metadata(&target) {
            Ok(existing) if is_dir && existing.is_dir() => {
                move_entries(&entry.path(), &target)?;
                moved += 1;
                continue;
            }
            Ok(existing) if existing.is_dir() => std::fs::remove_dir_all(&target)?,
            Ok(_) => std::fs::remove_file(&target)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        std::fs::rename(entry.path(), &target)?;
        moved += 1;
    }
    Ok(moved)
}

/// Removes everything in `dir` except the fingerprint file.
fn clean_output_dir(dir: &Path) -> io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let mut removed = 0usize;
    for entry in entries {
        let entry = entry?;
        if entry.file_name() == STORE_FILE_NAME {
            continue;
        }
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
        } else {
            std::fs::remove_file(entry.path())?;
        }
        removed += 1;
    }

    debug!(dir = %dir.display(), removed, "Cleaned output directory");
    Ok(())
}

const fn node_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "brew install node"
    } else if cfg!(target_os = "windows") {
        "https://nodejs.org/"
    } else {
        "sudo apt install nodejs npm"
    }
}

const fn java_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "brew install openjdk"
    } else if cfg!(target_os = "windows") {
        "https://www.java.com/download/"
    } else {
        "sudo apt install default-jre"
    }
}
