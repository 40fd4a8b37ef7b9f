//! Persisted fingerprint of the last successful generation.
//!
//! The store is a single text file, `<output_dir>/.schema.hash`, holding the
//! hexadecimal fingerprint and nothing else.
//!
//! # Guarantees
//!
//! - A missing file reads as `None`; every other read failure is an error.
//! - [`load`] never creates anything on disk.
//! - [`save`] writes a temporary file in the same directory and renames it
//!   over the target, so a concurrent reader sees either the old or the new
//!   fingerprint, never a partial one.
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use tsgen_core::{FileStore, Fingerprint, FingerprintStore};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let out = Utf8Path::from_path(dir.path()).unwrap().join("client");
//! let store = FileStore::in_output_dir(&out);
//!
//! assert_eq!(store.load().unwrap(), None);
//!
//! let fp = Fingerprint::of_bytes(b"{}");
//! store.save(&fp).unwrap();
//! assert_eq!(store.load().unwrap(), Some(fp));
//! ```

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::types::Fingerprint;

/// File name of the store inside the output directory.
pub const STORE_FILE_NAME: &str = ".schema.hash";

/// Access to the persisted fingerprint.
///
/// The regeneration controller is the only writer. Implementations other
/// than [`FileStore`] exist mainly as test doubles.
pub trait FingerprintStore: Send + Sync {
    /// Reads the stored fingerprint; `Ok(None)` when nothing was stored yet.
    fn load(&self) -> Result<Option<Fingerprint>, StoreError>;

    /// Replaces the stored fingerprint.
    fn save(&self, fingerprint: &Fingerprint) -> Result<(), StoreError>;

    /// Describes where the fingerprint lives, for log messages.
    fn location(&self) -> &Utf8Path;
}

impl<S: FingerprintStore + ?Sized> FingerprintStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<Fingerprint>, StoreError> {
        (**self).load()
    }

    fn save(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        (**self).save(fingerprint)
    }

    fn location(&self) -> &Utf8Path {
        (**self).location()
    }
}

/// A [`FingerprintStore`] backed by one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    path: Utf8PathBuf,
}

impl FileStore {
    /// Creates a store at an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at `<output_dir>/.schema.hash`.
    #[must_use]
    pub fn in_output_dir(output_dir: &Utf8Path) -> Self {
        Self::new(output_dir.join(STORE_FILE_NAME))
    }

    /// Returns the store file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl FingerprintStore for FileStore {
    fn load(&self) -> Result<Option<Fingerprint>, StoreError> {
        load(&self.path)
    }

    fn save(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        save(&self.path, fingerprint)
    }

    fn location(&self) -> &Utf8Path {
        &self.path
    }
}

/// Reads the fingerprint stored at `path`.
///
/// Content that is not a well-formed fingerprint is logged and treated as
/// absent, so the next successful generation overwrites it.
///
/// # Errors
///
/// Returns [`StoreError::Read`] for any I/O failure other than the file not
/// existing.
pub fn load(path: &Utf8Path) -> Result<Option<Fingerprint>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path, "No stored fingerprint");
            return Ok(None);
        }
        Err(error) => return Err(StoreError::read(path, error)),
    };

    let text = String::from_utf8_lossy(&bytes);
    let fingerprint = Fingerprint::parse(&text);
    if fingerprint.is_none() {
        warn!(path = %path, "Ignoring malformed stored fingerprint");
    }
    Ok(fingerprint)
}

/// Atomically writes `fingerprint` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`StoreError::Write`] if the directory cannot be created or the
/// file cannot be written or renamed into place.
pub fn save(path: &Utf8Path, fingerprint: &Fingerprint) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(|e| StoreError::write(path, e))?;

    let mut staged = tempfile::Builder::new()
        .prefix(STORE_FILE_NAME)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| StoreError::write(path, e))?;

    staged
        .write_all(fingerprint.as_str().as_bytes())
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| StoreError::write(path, e))?;

    staged
        .persist(path)
        .map_err(|e| StoreError::write(path, e.error))?;

    debug!(path = %path, fingerprint = fingerprint.short(), "Stored fingerprint");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path");
        (dir, root)
    }

    fn sample() -> Fingerprint {
        Fingerprint::parse(&format!("{}{}", "a".repeat(61), "111")).expect("valid fingerprint")
    }

    #[test]
    fn test_round_trip() {
        let (_dir, root) = temp_root();
        let path = root.join("out").join(STORE_FILE_NAME);

        save(&path, &sample()).unwrap();
        assert_eq!(load(&path).unwrap(), Some(sample()));
    }

    #[test]
    fn test_file_contains_only_the_digest() {
        let (_dir, root) = temp_root();
        let path = root.join(STORE_FILE_NAME);

        save(&path, &sample()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, sample().as_str());
    }

    #[test]
    fn test_missing_file_is_absent() {
        let (_dir, root) = temp_root();
        assert_eq!(load(&root.join(STORE_FILE_NAME)).unwrap(), None);
    }

    #[test]
    fn test_load_never_creates_directories() {
        let (_dir, root) = temp_root();
        let out = root.join("not").join("yet");

        assert_eq!(load(&out.join(STORE_FILE_NAME)).unwrap(), None);
        assert!(!out.exists());
    }

    #[test]
    fn test_directory_in_place_of_file_is_read_error() {
        let (_dir, root) = temp_root();
        let path = root.join(STORE_FILE_NAME);
        std::fs::create_dir(&path).unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.is_read());
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn test_save_overwrites_previous_value() {
        let (_dir, root) = temp_root();
        let path = root.join(STORE_FILE_NAME);
        let newer = Fingerprint::of_bytes(b"newer");

        save(&path, &sample()).unwrap();
        save(&path, &newer).unwrap();
        assert_eq!(load(&path).unwrap(), Some(newer));
    }

    #[test]
    fn test_save_leaves_no_staging_files() {
        let (_dir, root) = temp_root();
        save(&root.join(STORE_FILE_NAME), &sample()).unwrap();

        let names: Vec<String> = std::fs::read_dir(&root)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![STORE_FILE_NAME.to_owned()]);
    }

    #[test]
    fn test_save_under_a_regular_file_is_write_error() {
        let (_dir, root) = temp_root();
        let blocker = root.join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let path = blocker.join("client").join(STORE_FILE_NAME);
        let err = save(&path, &sample()).unwrap_err();
        assert!(!err.is_read());
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn test_malformed_content_is_treated_as_absent() {
        let (_dir, root) = temp_root();
        let path = root.join(STORE_FILE_NAME);
        std::fs::write(&path, "half-written").unwrap();

        assert_eq!(load(&path).unwrap(), None);
    }

    #[test]
    fn test_file_store_location() {
        let store = FileStore::in_output_dir(Utf8Path::new("frontend/src/api"));
        assert_eq!(store.location().as_str(), "frontend/src/api/.schema.hash");
        assert_eq!(store.path(), store.location());
    }
}
