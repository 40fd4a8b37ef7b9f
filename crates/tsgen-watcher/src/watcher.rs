//! Source watcher with async event streaming.
//!
//! This module provides the [`FileWatcher`] type that bridges the synchronous
//! `notify` file watching crate to the async tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Blocking Thread (spawn_blocking)             │
//! │  ┌──────────────────┐    ┌────────────────┐    ┌────────────┐  │
//! │  │ RecommendedWatcher│ -> │ Debouncer      │ -> │ Callback   │  │
//! │  │ (notify)         │    │ (batch_ms)     │    │ (filtering)│  │
//! │  └──────────────────┘    └────────────────┘    └─────┬──────┘  │
//! └──────────────────────────────────────────────────────│─────────┘
//!                                                        │
//!                                    blocking_send(batch)│
//!                                                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ FileWatcher      │    │ mpsc::Receiver │ -> on_triggering_   │
//! │  │ (shutdown ctrl)  │    │ (batches)      │    event()          │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The notifier's batch window only groups one burst of raw filesystem
//! events. Deciding when a burst has settled is the regeneration
//! controller's job.

use std::time::Duration;

use camino::Utf8PathBuf;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use smallvec::SmallVec;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use tsgen_core::WatchConfig;

use crate::error::WatchError;
use crate::events::{FileEvent, FileEventBatch};
use crate::filter::FileFilter;

/// Default channel capacity for event batches.
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

type Roots = SmallVec<[Utf8PathBuf; 2]>;

/// A source watcher that streams filtered event batches to async code.
///
/// # Lifecycle
///
/// 1. **Creation**: [`FileWatcher::new`] validates every root, creates the
///    channels, and spawns a blocking task with the notify watcher.
/// 2. **Event Reception**: [`recv`](Self::recv) yields one
///    [`FileEventBatch`] per notifier batch that had at least one relevant
///    path.
/// 3. **Shutdown**: [`shutdown`](Self::shutdown) for a graceful stop, or drop
///    the watcher, which signals the blocking task to stop.
///
/// # Examples
///
/// ```no_run
/// use tsgen_core::WatchConfig;
/// use tsgen_watcher::{ExtensionFilter, FileWatcher};
///
/// # async fn example() -> Result<(), tsgen_watcher::WatchError> {
/// let config = WatchConfig::default();
/// let mut watcher = FileWatcher::new(&config, ExtensionFilter::new(&["py"]))?;
///
/// while let Some(batch) = watcher.recv().await {
///     println!("{} file(s) changed", batch.unique_paths().len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileWatcher {
    /// Shutdown signal sender; `None` after shutdown is initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the blocking watcher task.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Batch receiver for async consumption.
    event_rx: mpsc::Receiver<FileEventBatch>,

    /// The canonicalized roots being watched.
    roots: Roots,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("roots", &self.roots)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Starts watching every root listed in `config.paths`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`WatchError::NoPaths`] if `config.paths` is empty
    /// - [`WatchError::PathNotFound`] if a root does not exist
    /// - [`WatchError::Io`] if a root cannot be canonicalized
    pub fn new<F: FileFilter>(config: &WatchConfig, filter: F) -> Result<Self, WatchError> {
        Self::with_capacity(config, filter, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Like [`new`](Self::new) with a custom channel capacity.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_capacity<F: FileFilter>(
        config: &WatchConfig,
        filter: F,
        channel_capacity: usize,
    ) -> Result<Self, WatchError> {
        let roots = resolve_roots(&config.paths)?;

        let (event_tx, event_rx) = mpsc::channel(channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_roots = roots.clone();
        let batch_window = Duration::from_millis(config.batch_ms);
        let mode = if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let task_handle = tokio::task::spawn_blocking(move || {
            run_watcher_loop(&task_roots, batch_window, mode, event_tx, shutdown_rx, filter)
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
            event_rx,
            roots,
        })
    }

    /// Receives the next batch of relevant changes.
    ///
    /// Returns `None` once the watcher has stopped.
    pub async fn recv(&mut self) -> Option<FileEventBatch> {
        self.event_rx.recv().await
    }

    /// Tries to receive a batch without waiting.
    pub fn try_recv(&mut self) -> Result<FileEventBatch, mpsc::error::TryRecvError> {
        self.event_rx.try_recv()
    }

    /// Returns the canonicalized roots being watched.
    #[must_use]
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// Returns `true` if the watcher task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Gracefully shuts down the watcher and waits for its thread.
    ///
    /// # Errors
    ///
    /// Returns the error the watcher thread stopped with, or
    /// [`WatchError::ChannelClosed`] if it panicked.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Ignore error if receiver is already dropped
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // The task stops on its own once it sees the signal.
    }
}

fn resolve_roots(paths: &[Utf8PathBuf]) -> Result<Roots, WatchError> {
    if paths.is_empty() {
        return Err(WatchError::NoPaths);
    }

    let mut roots = Roots::new();
    for path in paths {
        if !path.exists() {
            return Err(WatchError::path_not_found(path.clone()));
        }
        let root = path.canonicalize_utf8()?;
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    Ok(roots)
}

/// Converts one notifier batch into a filtered [`FileEventBatch`].
fn collect_batch<F: FileFilter>(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    filter: &F,
) -> FileEventBatch {
    let mut batch = FileEventBatch::new();
    for event in events {
        let path = match Utf8PathBuf::try_from(event.path) {
            Ok(p) => p,
            Err(e) => {
                let err = WatchError::non_utf8_path(e.into_path_buf());
                tracing::warn!(error = %err, "Skipping file event");
                continue;
            }
        };

        if !filter.should_process(&path) {
            tracing::trace!(path = %path, "Filtered out file event");
            continue;
        }

        batch.push(FileEvent::new(path));
    }
    batch
}

/// Runs the notify watcher loop in a blocking context.
fn run_watcher_loop<F: FileFilter>(
    roots: &[Utf8PathBuf],
    batch_window: Duration,
    mode: RecursiveMode,
    event_tx: mpsc::Sender<FileEventBatch>,
    shutdown_rx: oneshot::Receiver<()>,
    filter: F,
) -> Result<(), WatchError> {
    let debouncer_result: Result<Debouncer<notify::RecommendedWatcher>, notify::Error> =
        new_debouncer(batch_window, move |res: DebounceEventResult| match res {
            Ok(events) => {
                let batch = collect_batch(events, &filter);
                if batch.is_empty() {
                    return;
                }
                tracing::debug!(files = batch.unique_paths().len(), "Source change detected");
                if event_tx.blocking_send(batch).is_err() {
                    tracing::debug!("Event channel closed, dropping batch");
                }
            }
            Err(error) => tracing::warn!(error = %error, "Debouncer error"),
        });

    let mut debouncer = debouncer_result?;

    for root in roots {
        debouncer.watcher().watch(root.as_std_path(), mode)?;
        tracing::info!(path = %root, recursive = matches!(mode, RecursiveMode::Recursive), "Watching");
    }

    // Block until shutdown signal is received
    let _ = shutdown_rx.blocking_recv();

    tracing::info!(roots = roots.len(), "File watcher stopped");

    Ok(())
}
