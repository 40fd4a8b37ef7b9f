//! File filtering for watch events.
//!
//! Filtering happens on the watcher thread before events reach the channel,
//! so irrelevant changes never become triggering events. The filters that
//! matter for schema regeneration are:
//!
//! - [`ExtensionFilter`] - only backend source files (`.py` by default)
//! - [`IgnoreFilter`] - gitignore-style patterns (`__pycache__`, `.venv`, ...)
//! - [`ExcludeDirFilter`] - the generated client's own directory, so writing
//!   the client never triggers another regeneration
//!
//! [`watch_filter`] assembles all three from a [`WatchConfig`].
//!
//! # Examples
//!
//! ```
//! use tsgen_watcher::{CompositeFilter, ExtensionFilter, FileFilter};
//! use camino::Utf8Path;
//!
//! struct NoMigrations;
//!
//! impl FileFilter for NoMigrations {
//!     fn should_process(&self, path: &Utf8Path) -> bool {
//!         !path.as_str().contains("/migrations/")
//!     }
//! }
//!
//! let filter = CompositeFilter::new()
//!     .and(ExtensionFilter::new(&["py"]))
//!     .and(NoMigrations);
//!
//! assert!(filter.should_process(Utf8Path::new("app/api/views.py")));
//! assert!(!filter.should_process(Utf8Path::new("app/migrations/0001_initial.py")));
//! assert!(!filter.should_process(Utf8Path::new("app/static/site.css")));
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use smallvec::SmallVec;

use tsgen_core::WatchConfig;

use crate::error::WatchError;

/// A filter for determining which file events to process.
///
/// Filters must be [`Send`] and [`Sync`] because they run on the blocking
/// watcher thread, and `'static` to be moved into it.
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if the event for `path` should be forwarded.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts all files.
///
/// # Examples
///
/// ```
/// use tsgen_watcher::{AcceptAllFilter, FileFilter};
/// use camino::Utf8Path;
///
/// assert!(AcceptAllFilter.should_process(Utf8Path::new("anything.txt")));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// A filter based on file extensions.
///
/// An empty extension list accepts every file.
///
/// # Examples
///
/// ```
/// use tsgen_watcher::{ExtensionFilter, FileFilter};
/// use camino::Utf8Path;
///
/// let filter = ExtensionFilter::new(&["py", "pyi"]);
/// assert!(filter.should_process(Utf8Path::new("api/schemas.py")));
/// assert!(filter.should_process(Utf8Path::new("api/stubs.pyi")));
/// assert!(!filter.should_process(Utf8Path::new("api/schemas.pyc")));
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: SmallVec<[String; 8]>,
}

impl ExtensionFilter {
    /// Creates a new extension filter (extensions without the leading dot).
    #[must_use]
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|s| normalize_extension(s)).collect(),
        }
    }

    /// Creates an extension filter from owned strings.
    #[must_use]
    pub fn from_owned(extensions: Vec<String>) -> Self {
        Self {
            extensions: extensions.iter().map(|s| normalize_extension(s)).collect(),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_owned()
}

impl FileFilter for ExtensionFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        self.extensions.is_empty()
            || path
                .extension()
                .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Rejects paths matching gitignore-style patterns.
///
/// A path is rejected when it, or any of its parent directories, matches.
/// `__pycache__` therefore rejects every file below any `__pycache__`
/// directory.
///
/// # Examples
///
/// ```
/// use tsgen_watcher::{FileFilter, IgnoreFilter};
/// use camino::Utf8Path;
///
/// let filter = IgnoreFilter::new(Utf8Path::new("/srv/app"), &["__pycache__", "*.tmp"]).unwrap();
/// assert!(filter.should_process(Utf8Path::new("/srv/app/api/views.py")));
/// assert!(!filter.should_process(Utf8Path::new("/srv/app/api/__pycache__/views.py")));
/// assert!(!filter.should_process(Utf8Path::new("/srv/app/api/views.tmp")));
/// ```
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: Utf8PathBuf,
    matcher: Gitignore,
}

impl IgnoreFilter {
    /// Compiles `patterns` relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPattern`] for a pattern that is not a
    /// valid glob.
    pub fn new<S: AsRef<str>>(root: &Utf8Path, patterns: &[S]) -> Result<Self, WatchError> {
        let mut builder = GitignoreBuilder::new(root.as_std_path());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder
                .add_line(None, pattern)
                .map_err(|e| WatchError::invalid_pattern(pattern, e))?;
        }
        let matcher = builder
            .build()
            .map_err(|e| WatchError::invalid_pattern(patterns_summary(patterns), e))?;

        Ok(Self {
            root: root.to_owned(),
            matcher,
        })
    }

    /// Returns the number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matcher.len()
    }

    /// Returns `true` if no patterns were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }
}

fn patterns_summary<S: AsRef<str>>(patterns: &[S]) -> String {
    patterns
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

impl FileFilter for IgnoreFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        if self.matcher.is_empty() {
            return true;
        }

        // The file itself, then each parent up to (not including) the root.
        let mut is_dir = false;
        for candidate in path.ancestors() {
            if candidate.as_str().is_empty() || candidate == self.root {
                break;
            }
            if self
                .matcher
                .matched(candidate.as_std_path(), is_dir)
                .is_ignore()
            {
                return false;
            }
            is_dir = true;
        }
        true
    }
}

/// Rejects everything below a set of directories.
///
/// Directory paths are resolved through the longest existing ancestor, so a
/// directory that does not exist yet still compares equal to the absolute
/// paths the notifier reports once it is created.
///
/// # Examples
///
/// ```
/// use tsgen_watcher::{ExcludeDirFilter, FileFilter};
/// use camino::Utf8Path;
///
/// let filter = ExcludeDirFilter::new(["/srv/frontend/src/api"]);
/// assert!(!filter.should_process(Utf8Path::new("/srv/frontend/src/api/index.ts")));
/// assert!(filter.should_process(Utf8Path::new("/srv/frontend/src/apix/index.ts")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExcludeDirFilter {
    dirs: SmallVec<[Utf8PathBuf; 2]>,
}

impl ExcludeDirFilter {
    /// Creates a filter rejecting paths below any of `dirs`.
    #[must_use]
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        Self {
            dirs: dirs
                .into_iter()
                .map(|dir| resolve_existing_prefix(dir.as_ref()))
                .collect(),
        }
    }
}

impl FileFilter for ExcludeDirFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        !self.dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// Canonicalizes the longest existing ancestor of `path` and re-appends the
/// rest. Falls back to `path` unchanged.
fn resolve_existing_prefix(path: &Utf8Path) -> Utf8PathBuf {
    let mut remainder: Vec<&str> = Vec::new();
    let mut current = path;
    loop {
        if let Ok(resolved) = current.canonicalize_utf8() {
            let mut out = resolved;
            out.extend(remainder.iter().rev());
            return out;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name);
                current = if parent.as_str().is_empty() {
                    Utf8Path::new(".")
                } else {
                    parent
                };
            }
            _ => return path.to_owned(),
        }
    }
}

/// A composite filter that combines multiple filters with AND logic.
///
/// An empty composite accepts every file.
pub struct CompositeFilter {
    filters: Vec<Box<dyn FileFilter>>,
}

impl CompositeFilter {
    /// Creates a new empty composite filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Adds a filter to the composite.
    #[must_use]
    pub fn and<F: FileFilter>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Returns the number of filters combined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if no filter was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for CompositeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompositeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeFilter")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl FileFilter for CompositeFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        self.filters.iter().all(|f| f.should_process(path))
    }
}

// Implement FileFilter for boxed filters
impl<F: FileFilter + ?Sized> FileFilter for Box<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

// Implement FileFilter for Arc-wrapped filters (useful for shared filters)
impl<F: FileFilter + ?Sized> FileFilter for std::sync::Arc<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

/// Builds the filter used by `tsgen watch`.
///
/// Combines the configured extensions and ignore patterns (relative to
/// `base_dir`) with an exclusion of every directory in `excluded`, normally
/// the client output directory.
///
/// # Errors
///
/// Returns [`WatchError::InvalidPattern`] if an ignore pattern is invalid.
pub fn watch_filter(
    config: &WatchConfig,
    base_dir: &Utf8Path,
    excluded: &[Utf8PathBuf],
) -> Result<CompositeFilter, WatchError> {
    let root = resolve_existing_prefix(base_dir);
    let excluded: Vec<Utf8PathBuf> = excluded.iter().map(|dir| base_dir.join(dir)).collect();

    Ok(CompositeFilter::new()
        .and(ExtensionFilter::from_owned(config.extensions.clone()))
        .and(IgnoreFilter::new(&root, config.ignore_patterns.as_slice())?)
        .and(ExcludeDirFilter::new(&excluded)))
}
