//! File watching for tracked folders.
//!
//! Events feed the lock-free single-file classification path. Duplicate or
//! missing events are tolerated: classification is idempotent and every
//! reconciliation rebuilds the change list from scratch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::registry::WorkspaceRegistry;

/// Watches tracked folders and reclassifies files as they change
pub struct FolderWatcher {
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
    task: JoinHandle<()>,
}

impl FolderWatcher {
    /// Create the watcher and start its event processor. Must be called
    /// from within a tokio runtime.
    pub fn start(registry: Arc<WorkspaceRegistry>) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event_tx.send(event).is_err() {
                        debug!("File watcher event channel closed");
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            }
        })?;

        let task = tokio::spawn(Self::process_events(event_rx, registry));

        Ok(Self {
            watcher,
            watched: Vec::new(),
            task,
        })
    }

    /// Start watching a folder root (non-recursive)
    pub fn watch(&mut self, root: &Path) -> Result<()> {
        self.watcher.watch(root, RecursiveMode::NonRecursive)?;
        self.watched.push(root.to_path_buf());
        info!("Watching folder: {}", root.display());
        Ok(())
    }

    /// Stop watching a folder root
    pub fn unwatch(&mut self, root: &Path) -> Result<()> {
        self.watcher.unwatch(root)?;
        self.watched.retain(|path| path != root);
        info!("Stopped watching folder: {}", root.display());
        Ok(())
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    async fn process_events(
        mut event_rx: mpsc::UnboundedReceiver<Event>,
        registry: Arc<WorkspaceRegistry>,
    ) {
        info!("File watcher event processor started");

        while let Some(event) = event_rx.recv().await {
            if !is_relevant(&event.kind) {
                continue;
            }

            for path in &event.paths {
                let Some(folder) = registry.folder_for(path) else {
                    continue;
                };

                match folder.handle_file_event(path).await {
                    Ok(Some(state)) => debug!(path = %path.display(), %state, "Reclassified file"),
                    Ok(None) => {}
                    Err(e) => warn!(path = %path.display(), "Failed to classify file: {}", e),
                }
            }
        }

        info!("File watcher event processor stopped");
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_relevant_event_kinds() {
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_relevant(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_relevant(&EventKind::Access(AccessKind::Read)));
        assert!(!is_relevant(&EventKind::Other));
    }
}
