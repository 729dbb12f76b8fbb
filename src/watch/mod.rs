//! Change watcher - turns filesystem events under the content root into change notifications
//!
//! The root and every directory below it are registered when the watcher is
//! created. Directories that appear later (created or renamed into the tree)
//! are registered as soon as their event is observed, so a freshly added post
//! is watched without restarting the server.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Kind of a qualifying filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
}

/// A single qualifying filesystem event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub paths: Vec<PathBuf>,
}

/// Map a raw notify event kind to a change kind, if it is one we react to
pub fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
            Some(ChangeKind::Write)
        }
        // chmod/touch and reads never change what the listing shows
        _ => None,
    }
}

/// Watches a content root and yields its changes
pub struct ChangeWatcher {
    root: PathBuf,
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl ChangeWatcher {
    /// Create the watcher and register the root and all directories below it
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res| {
            // The receiver only goes away together with the watcher
            let _ = tx.send(res);
        })
        .map_err(|source| Error::Watch {
            path: root.to_path_buf(),
            source,
        })?;

        let mut change_watcher = Self {
            root: root.to_path_buf(),
            watcher,
            events,
        };

        let count = change_watcher.register_tree(root)?;
        tracing::info!("Watching {} directories under {:?}", count, root);

        Ok(change_watcher)
    }

    /// Root this watcher was created for
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wait for the next qualifying change
    ///
    /// Delivery errors from the platform watcher are logged and skipped.
    /// Returns `None` only if the underlying watcher has shut down.
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.events.recv().await? {
                Ok(event) => {
                    let Some(kind) = classify(&event.kind) else {
                        tracing::trace!("Ignoring {:?} on {:?}", event.kind, event.paths);
                        continue;
                    };

                    tracing::info!("File changed: {:?} {:?}", kind, event.paths);

                    if matches!(kind, ChangeKind::Create | ChangeKind::Rename) {
                        self.register_new_dirs(&event.paths);
                    }

                    return Some(ChangeEvent {
                        kind,
                        paths: event.paths,
                    });
                }
                Err(e) => {
                    tracing::error!("Watch error: {}", e);
                }
            }
        }
    }

    /// Turn the watcher into an endless stream of changes
    pub fn into_stream(mut self) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        async_stream::stream! {
            while let Some(change) = self.next_change().await {
                yield change;
            }
        }
    }

    /// Register `dir` and every directory below it, returning how many were added
    fn register_tree(&mut self, dir: &Path) -> Result<usize> {
        let mut count = 0;
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|source| Error::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            self.watcher
                .watch(entry.path(), RecursiveMode::NonRecursive)
                .map_err(|source| Error::Watch {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
            tracing::debug!("Watching: {:?}", entry.path());
            count += 1;
        }
        Ok(count)
    }

    fn register_new_dirs(&mut self, paths: &[PathBuf]) {
        for path in paths.iter().filter(|p| p.is_dir()) {
            if let Err(e) = self.register_tree(path) {
                tracing::warn!("Failed to watch new directory {:?}: {}", path, e);
            }
        }
    }
}
