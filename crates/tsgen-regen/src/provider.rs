//! Schema providers and identifier resolution.
//!
//! The controller never interprets provider identifiers itself. It asks a
//! [`ProviderResolver`] for a [`SchemaProvider`] at the start of every cycle,
//! so a provider that appears later (a script added, a file generated) is
//! picked up without a restart.
//!
//! [`IdentifierResolver`] understands two schemes:
//!
//! | Identifier | Provider |
//! |---|---|
//! | `file:<path>` or a bare path | [`FileProvider`]: reads a JSON schema file |
//! | `cmd:<program> <args>` | [`CommandProvider`]: runs a command that prints the schema |
//! | `cmd:["<program>", "<arg>"]` | [`CommandProvider`], with the argv as a JSON array |
//!
//! The plain `cmd:` form splits on whitespace and does not understand
//! quoting. Programs or arguments containing spaces need the JSON array form.
//!
//! Any other `scheme:` prefix does not resolve.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::process::Command;
use tracing::debug;

use tsgen_core::SchemaDocument;

use crate::error::{MAX_STDERR_CHARS, ProviderError};
use crate::tools::{self, Lookup};

/// Default limit for a `cmd:` provider run.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Something that can produce the current schema document.
pub trait SchemaProvider: Send + Sync {
    /// Returns the identifier this provider was resolved from.
    fn identifier(&self) -> &str;

    /// Obtains the current schema document.
    fn get_schema(&self) -> impl Future<Output = Result<SchemaDocument, ProviderError>> + Send;
}

/// Turns a configured identifier into a [`SchemaProvider`].
pub trait ProviderResolver: Send + Sync {
    /// The provider type produced.
    type Provider: SchemaProvider;

    /// Resolves `identifier`.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Unresolved`] if nothing answers to the identifier,
    /// [`ProviderError::MissingCapability`] if it cannot supply a schema.
    fn resolve(&self, identifier: &str) -> Result<Self::Provider, ProviderError>;
}

impl<R: ProviderResolver + ?Sized> ProviderResolver for std::sync::Arc<R> {
    type Provider = R::Provider;

    fn resolve(&self, identifier: &str) -> Result<Self::Provider, ProviderError> {
        (**self).resolve(identifier)
    }
}

/// Reads a schema from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProvider {
    identifier: String,
    path: Utf8PathBuf,
}

impl FileProvider {
    /// Returns the schema file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl SchemaProvider for FileProvider {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_schema(&self) -> Result<SchemaDocument, ProviderError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ProviderError::extraction(&self.identifier, format!("{}: {e}", self.path)))?;
        SchemaDocument::from_json_slice(&bytes)
            .map_err(|e| ProviderError::extraction(&self.identifier, format!("{} is not JSON: {e}", self.path)))
    }
}

/// Runs a command and parses its standard output as the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandProvider {
    identifier: String,
    program: PathBuf,
    args: Vec<String>,
    working_dir: Utf8PathBuf,
    timeout: Duration,
}

impl CommandProvider {
    /// Returns the resolved program path.
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Returns the arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl SchemaProvider for CommandProvider {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_schema(&self) -> Result<SchemaDocument, ProviderError> {
        debug!(program = %self.program.display(), args = ?self.args, "Running schema command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ProviderError::extraction(&self.identifier, e)),
            Err(_) => {
                return Err(ProviderError::extraction(
                    &self.identifier,
                    format!("timed out after {} seconds", self.timeout.as_secs_f64()),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            return Err(ProviderError::extraction(
                &self.identifier,
                format!("command exited with {}: {stderr}", output.status),
            ));
        }

        SchemaDocument::from_json_slice(&output.stdout).map_err(|e| {
            ProviderError::extraction(&self.identifier, format!("command output is not JSON: {e}"))
        })
    }
}

/// A provider produced by [`IdentifierResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinProvider {
    /// `file:` or bare path.
    File(FileProvider),
    /// `cmd:`.
    Command(CommandProvider),
}

impl SchemaProvider for BuiltinProvider {
    fn identifier(&self) -> &str {
        match self {
            Self::File(p) => p.identifier(),
            Self::Command(p) => p.identifier(),
        }
    }

    async fn get_schema(&self) -> Result<SchemaDocument, ProviderError> {
        match self {
            Self::File(p) => p.get_schema().await,
            Self::Command(p) => p.get_schema().await,
        }
    }
}

/// Resolves `file:` and `cmd:` identifiers relative to a base directory.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use tsgen_regen::{IdentifierResolver, ProviderError, ProviderResolver};
///
/// let resolver = IdentifierResolver::new(Utf8Path::new("."));
///
/// let err = resolver.resolve("http://localhost:8000/openapi.json").unwrap_err();
/// assert!(matches!(err, ProviderError::Unresolved { .. }));
///
/// let err = resolver.resolve("file:does/not/exist.json").unwrap_err();
/// assert!(matches!(err, ProviderError::Unresolved { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierResolver {
    base_dir: Utf8PathBuf,
    command_timeout: Duration,
}

impl IdentifierResolver {
    /// Creates a resolver for paths relative to `base_dir`.
    #[must_use]
    pub fn new(base_dir: &Utf8Path) -> Self {
        Self {
            base_dir: base_dir.to_owned(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the limit for `cmd:` provider runs.
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn resolve_file(&self, identifier: &str, raw: &str) -> Result<FileProvider, ProviderError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProviderError::unresolved(identifier, "no file path given"));
        }

        let path = self.base_dir.join(raw);
        if !path.exists() {
            return Err(ProviderError::unresolved(identifier, format!("{path} does not exist")));
        }
        if !path.is_file() {
            return Err(ProviderError::missing_capability(
                identifier,
                format!("{path} is not a file"),
            ));
        }
        if !path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            return Err(ProviderError::missing_capability(
                identifier,
                format!("{path} is not a .json schema file"),
            ));
        }

        Ok(FileProvider {
            identifier: identifier.to_owned(),
            path,
        })
    }

    fn resolve_command(&self, identifier: &str, raw: &str) -> Result<CommandProvider, ProviderError> {
        let argv = command_words(identifier, raw)?;
        let Some((program, args)) = argv.split_first() else {
            return Err(ProviderError::unresolved(identifier, "no command given"));
        };

        let program = match tools::lookup_program(program, self.base_dir.as_std_path()) {
            Lookup::Executable(path) => path,
            Lookup::NotExecutable(path) => {
                return Err(ProviderError::missing_capability(
                    identifier,
                    format!("{} is not executable", path.display()),
                ));
            }
            Lookup::Missing => {
                return Err(ProviderError::unresolved(
                    identifier,
                    format!("program '{program}' not found"),
                ));
            }
        };

        Ok(CommandProvider {
            identifier: identifier.to_owned(),
            program,
            args: args.to_vec(),
            working_dir: self.base_dir.clone(),
            timeout: self.command_timeout,
        })
    }
}

/// Splits a `cmd:` body into argv, either a JSON array or whitespace-separated.
fn command_words(identifier: &str, raw: &str) -> Result<Vec<String>, ProviderError> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| {
            ProviderError::unresolved(identifier, format!("invalid command array: {e}"))
        })
    } else {
        Ok(raw.split_whitespace().map(str::to_owned).collect())
    }
}

/// Splits `scheme:rest`; single letters are treated as drive prefixes.
fn split_scheme(identifier: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = identifier.split_once(':')?;
    let is_scheme = scheme.len() > 1
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    is_scheme.then_some((scheme, rest))
}

impl ProviderResolver for IdentifierResolver {
    type Provider = BuiltinProvider;

    fn resolve(&self, identifier: &str) -> Result<BuiltinProvider, ProviderError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(ProviderError::unresolved(identifier, "empty identifier"));
        }

        match split_scheme(trimmed) {
            Some(("file", rest)) => self.resolve_file(identifier, rest).map(BuiltinProvider::File),
            Some(("cmd", rest)) => self
                .resolve_command(identifier, rest)
                .map(BuiltinProvider::Command),
            Some((scheme, _)) => Err(ProviderError::unresolved(
                identifier,
                format!("unknown provider scheme '{scheme}'"),
            )),
            None => self.resolve_file(identifier, trimmed).map(BuiltinProvider::File),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_base() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path");
        (dir, base)
    }

    fn write_schema(base: &Utf8Path, name: &str) {
        let schema = json!({
            "openapi": "3.1.0",
            "info": {"title": "NinjaAPI", "version": "1.0.0"},
            "paths": {"/api/items": {"get": {}}}
        });
        std::fs::write(base.join(name), schema.to_string()).unwrap();
    }

    #[test]
    fn test_split_scheme() {
        assert_eq!(split_scheme("cmd:python x"), Some(("cmd", "python x")));
        assert_eq!(split_scheme("file:a.json"), Some(("file", "a.json")));
        assert_eq!(split_scheme("C:\\schema.json"), None);
        assert_eq!(split_scheme("schema.json"), None);
    }

    #[tokio::test]
    async fn test_file_provider_reads_schema() {
        let (_dir, base) = temp_base();
        write_schema(&base, "openapi.json");
        let resolver = IdentifierResolver::new(&base);

        for identifier in ["file:openapi.json", "openapi.json"] {
            let provider = resolver.resolve(identifier).unwrap();
            assert_eq!(provider.identifier(), identifier);
            let document = provider.get_schema().await.unwrap();
            assert_eq!(document.title(), Some("NinjaAPI"));
        }
    }

    #[test]
    fn test_missing_file_is_unresolved() {
        let (_dir, base) = temp_base();
        let err = IdentifierResolver::new(&base).resolve("file:openapi.json").unwrap_err();
        assert!(matches!(err, ProviderError::Unresolved { .. }));
    }

    #[test]
    fn test_directory_or_non_json_lacks_capability() {
        let (_dir, base) = temp_base();
        std::fs::create_dir(base.join("schemas")).unwrap();
        std::fs::write(base.join("schema.yaml"), "openapi: 3.1.0").unwrap();
        let resolver = IdentifierResolver::new(&base);

        assert!(matches!(
            resolver.resolve("schemas").unwrap_err(),
            ProviderError::MissingCapability { .. }
        ));
        assert!(matches!(
            resolver.resolve("file:schema.yaml").unwrap_err(),
            ProviderError::MissingCapability { .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_file_is_extraction_error() {
        let (_dir, base) = temp_base();
        std::fs::write(base.join("openapi.json"), "{ nope").unwrap();

        let provider = IdentifierResolver::new(&base).resolve("openapi.json").unwrap();
        let err = provider.get_schema().await.unwrap_err();
        assert!(matches!(err, ProviderError::Extraction { .. }));
    }

    #[test]
    fn test_unknown_scheme_is_unresolved() {
        let (_dir, base) = temp_base();
        let err = IdentifierResolver::new(&base)
            .resolve("module:app.api.api")
            .unwrap_err();
        assert!(err.to_string().contains("unknown provider scheme 'module'"));
    }

    #[test]
    fn test_empty_identifiers_are_unresolved() {
        let (_dir, base) = temp_base();
        let resolver = IdentifierResolver::new(&base);
        for identifier in ["", "   ", "cmd:", "file:", "cmd:[]", r#"cmd:["./export.sh", 1]"#, "cmd:[oops"] {
            assert!(
                matches!(resolver.resolve(identifier), Err(ProviderError::Unresolved { .. })),
                "{identifier:?}"
            );
        }
    }

    #[test]
    fn test_missing_program_is_unresolved() {
        let (_dir, base) = temp_base();
        let err = IdentifierResolver::new(&base)
            .resolve("cmd:tsgen-test-no-such-program --flag")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unresolved { .. }));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_script(base: &Utf8Path, name: &str, body: &str, mode: u32) {
            let path = base.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        }

        #[tokio::test]
        async fn test_command_provider_parses_stdout() {
            let (_dir, base) = temp_base();
            write_schema(&base, "schema.json");
            write_script(&base, "export.sh", "cat \"$1\"", 0o755);

            let provider = IdentifierResolver::new(&base)
                .resolve("cmd:./export.sh schema.json")
                .unwrap();
            let BuiltinProvider::Command(command) = &provider else {
                panic!("expected a command provider");
            };
            assert_eq!(command.args(), ["schema.json"]);

            let document = provider.get_schema().await.unwrap();
            assert_eq!(document.path_count(), 1);
        }

        #[tokio::test]
        async fn test_command_array_allows_spaces() {
            let (_dir, base) = temp_base();
            write_schema(&base, "api schema.json");
            std::fs::create_dir(base.join("my scripts")).unwrap();
            write_script(&base, "my scripts/export.sh", "cat \"$1\"", 0o755);

            let provider = IdentifierResolver::new(&base)
                .resolve(r#"cmd:["./my scripts/export.sh", "api schema.json"]"#)
                .unwrap();
            let BuiltinProvider::Command(command) = &provider else {
                panic!("expected a command provider");
            };
            assert!(command.program().ends_with("my scripts/export.sh"));
            assert_eq!(command.args(), ["api schema.json"]);

            let document = provider.get_schema().await.unwrap();
            assert_eq!(document.path_count(), 1);
        }

        #[test]
        fn test_non_executable_script_lacks_capability() {
            let (_dir, base) = temp_base();
            write_script(&base, "export.sh", "true", 0o644);

            let err = IdentifierResolver::new(&base)
                .resolve("cmd:./export.sh")
                .unwrap_err();
            assert!(matches!(err, ProviderError::MissingCapability { .. }));
        }

        #[tokio::test]
        async fn test_failing_command_is_extraction_error() {
            let (_dir, base) = temp_base();
            write_script(&base, "export.sh", "echo 'ImportError: no module' >&2; exit 3", 0o755);

            let provider = IdentifierResolver::new(&base).resolve("cmd:./export.sh").unwrap();
            let err = provider.get_schema().await.unwrap_err();
            assert!(matches!(err, ProviderError::Extraction { .. }));
            assert!(err.to_string().contains("ImportError"));
        }

        #[tokio::test]
        async fn test_non_json_output_is_extraction_error() {
            let (_dir, base) = temp_base();
            write_script(&base, "export.sh", "echo 'Performing system checks...'", 0o755);

            let provider = IdentifierResolver::new(&base).resolve("cmd:./export.sh").unwrap();
            let err = provider.get_schema().await.unwrap_err();
            assert!(err.to_string().contains("not JSON"));
        }

        #[tokio::test]
        async fn test_slow_command_times_out() {
            let (_dir, base) = temp_base();
            write_script(&base, "export.sh", "sleep 5", 0o755);

            let provider = IdentifierResolver::new(&base)
                .with_command_timeout(Duration::from_millis(100))
                .resolve("cmd:./export.sh")
                .unwrap();
            let err = provider.get_schema().await.unwrap_err();
            assert!(err.to_string().contains("timed out"));
        }
    }
}
