//! Event types for source change notifications.
//!
//! The watcher delivers one [`FileEventBatch`] per notifier batch window.
//! Each batch is one triggering event for the regeneration controller, no
//! matter how many files it names.
//!
//! ```text
//! File System Change
//!        │
//!        ▼
//! notify-debouncer-mini (batch_ms window)
//!        │
//!        ▼
//!   filter, FileEventBatch
//!        │
//!        ▼
//!   Sent via channel to the controller host
//! ```

use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// A file change event with a UTF-8 path guarantee.
///
/// The event does not distinguish between create, modify, or delete since the
/// notifier's debouncer abstracts these away. For schema regeneration only
/// "something relevant changed" matters.
///
/// # Examples
///
/// ```
/// use tsgen_watcher::FileEvent;
/// use camino::Utf8PathBuf;
///
/// let event = FileEvent::new(Utf8PathBuf::from("api/views.py"));
/// assert_eq!(event.path.as_str(), "api/views.py");
/// assert_eq!(event.extension(), Some("py"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The path of the file that changed.
    pub path: Utf8PathBuf,

    /// When this event was received.
    pub timestamp: Instant,
}

impl FileEvent {
    /// Creates a new file event for the given path, stamped now.
    #[inline]
    #[must_use]
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            timestamp: Instant::now(),
        }
    }

    /// Returns the file extension, if any.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.path.extension()
    }

    /// Returns the file name without the directory path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

/// A batch of file events received together.
///
/// Uses [`SmallVec`] with inline storage for up to 8 events; an editor save
/// typically touches one or two files.
///
/// # Examples
///
/// ```
/// use tsgen_watcher::{FileEvent, FileEventBatch};
/// use camino::Utf8PathBuf;
///
/// let batch: FileEventBatch = ["api/a.py", "api/b.py", "api/a.py"]
///     .into_iter()
///     .map(|p| FileEvent::new(Utf8PathBuf::from(p)))
///     .collect();
///
/// assert_eq!(batch.len(), 3);
/// assert_eq!(batch.unique_paths().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FileEventBatch {
    /// The events in this batch.
    pub events: SmallVec<[FileEvent; 8]>,

    /// When this batch was assembled.
    pub received_at: Instant,
}

impl FileEventBatch {
    /// Creates a new empty batch.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: SmallVec::new(),
            received_at: Instant::now(),
        }
    }

    /// Adds an event to the batch.
    #[inline]
    pub fn push(&mut self, event: FileEvent) {
        self.events.push(event);
    }

    /// Returns the number of events in this batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the batch contains no events.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns an iterator over the events.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &FileEvent> {
        self.events.iter()
    }

    /// Returns the distinct paths in this batch, in first-seen order.
    #[must_use]
    pub fn unique_paths(&self) -> Vec<&Utf8Path> {
        let mut seen = FxHashSet::default();
        self.events
            .iter()
            .map(|e| e.path.as_path())
            .filter(|path| seen.insert(*path))
            .collect()
    }
}

impl Default for FileEventBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoIterator for FileEventBatch {
    type Item = FileEvent;
    type IntoIter = smallvec::IntoIter<[FileEvent; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileEventBatch {
    type Item = &'a FileEvent;
    type IntoIter = std::slice::Iter<'a, FileEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl FromIterator<FileEvent> for FileEventBatch {
    fn from_iter<T: IntoIterator<Item = FileEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
            received_at: Instant::now(),
        }
    }
}
