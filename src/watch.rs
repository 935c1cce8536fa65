//! File watching for refreshable resources.
//!
//! Resources such as templates or route tables implement [`Refresh`]. The
//! watcher marks a resource dirty when one of its paths changes; the next
//! request refreshes it before any other stage runs. Resources start dirty,
//! so the first request always refreshes them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use thiserror::Error;

/// A resource rebuilt from files on disk.
pub trait Refresh: Send + Sync {
    fn refresh(&self) -> Result<(), RefreshError>;
}

/// Why a resource could not be rebuilt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct RefreshError(pub String);

/// Failure to start watching a path.
#[derive(Debug, Error)]
#[error("failed to watch {path}: {source}")]
pub struct WatchError {
    pub path: PathBuf,
    #[source]
    pub source: notify::Error,
}

/// A resource and the paths it is built from.
#[derive(Clone)]
pub struct WatchTarget {
    pub target: Arc<dyn Refresh>,
    pub paths: Vec<PathBuf>,
}

impl std::fmt::Debug for WatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchTarget")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

struct Entry {
    target: Arc<dyn Refresh>,
    dirty: Arc<AtomicBool>,
    _watcher: Option<RecommendedWatcher>,
}

/// Tracks which resources need a refresh.
#[derive(Default)]
pub struct Watcher {
    entries: Vec<Entry>,
    refresh_lock: Mutex<()>,
}

impl Watcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `paths` (recursively) on behalf of `target`.
    pub fn listen(&mut self, target: Arc<dyn Refresh>, paths: &[PathBuf]) -> Result<(), WatchError> {
        let dirty = Arc::new(AtomicBool::new(true));

        let watcher = if paths.is_empty() {
            None
        } else {
            let flag = Arc::clone(&dirty);
            let mut watcher = RecommendedWatcher::new(
                move |res: notify::Result<Event>| match res {
                    Ok(event) => {
                        if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                            tracing::debug!(paths = ?event.paths, "Watched file changed");
                            flag.store(true, Ordering::SeqCst);
                        }
                    }
                    Err(e) => tracing::error!("Watch error: {:?}", e),
                },
                Config::default().with_poll_interval(Duration::from_secs(2)),
            )
            .map_err(|source| watch_error(paths.first().map(PathBuf::as_path), source))?;

            for path in paths {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(|source| watch_error(Some(path), source))?;
            }
            tracing::info!(paths = ?paths, "Watching for changes");
            Some(watcher)
        };

        self.entries.push(Entry {
            target,
            dirty,
            _watcher: watcher,
        });
        Ok(())
    }

    /// Refresh every dirty resource, stopping at the first failure.
    ///
    /// A resource that fails stays dirty so the next call retries it.
    pub fn notify(&self) -> Result<(), RefreshError> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        for entry in &self.entries {
            if entry.dirty.swap(false, Ordering::SeqCst) {
                if let Err(e) = entry.target.refresh() {
                    entry.dirty.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Number of resources being tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn mark_dirty(&self, index: usize) {
        self.entries[index].dirty.store(true, Ordering::SeqCst);
    }
}

/// Refresh each target once. Used when watching is turned off.
pub fn refresh_all(targets: &[WatchTarget]) {
    for target in targets {
        if let Err(e) = target.target.refresh() {
            tracing::error!(paths = ?target.paths, error = %e, "Failed to refresh resource");
        }
    }
}

fn watch_error(path: Option<&Path>, source: notify::Error) -> WatchError {
    WatchError {
        path: path.map(Path::to_path_buf).unwrap_or_default(),
        source,
    }
}
