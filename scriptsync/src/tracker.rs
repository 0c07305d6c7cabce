//! Live list of pending changes for one tracked folder

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::detector::ChangeDetector;
use crate::error::Result;
use crate::state::{ChangeState, ResourceState};

/// A change-state transition for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    /// New state, or `None` once the path has no pending change
    pub state: Option<ChangeState>,
}

/// Receives every state transition the tracker makes
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, event: ChangeEvent);
}

/// Notifier that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify(&self, _event: ChangeEvent) {}
}

/// Sending half of a [`ChangeChannel`]
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChangeNotifier for ChannelNotifier {
    fn notify(&self, event: ChangeEvent) {
        // A closed receiver only means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

/// Channel for receiving change notifications
pub struct ChangeChannel {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl ChangeChannel {
    /// Create a new change channel
    pub fn new() -> (ChannelNotifier, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelNotifier { sender }, Self { receiver })
    }

    /// Receive the next change event
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Receive a change event without waiting
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Pending changes of a folder, kept in insertion order
pub struct ChangeTracker {
    detector: ChangeDetector,
    states: RwLock<Vec<ResourceState>>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl ChangeTracker {
    pub fn new(detector: ChangeDetector, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            detector,
            states: RwLock::new(Vec::new()),
            notifier,
        }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Copy of the current list
    pub fn states(&self) -> Vec<ResourceState> {
        self.states.read().clone()
    }

    pub fn get(&self, path: &Path) -> Option<ChangeState> {
        self.states
            .read()
            .iter()
            .find(|entry| entry.path == path)
            .map(|entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    /// Replace the entry for `path`, or append one
    pub fn upsert(&self, path: impl Into<PathBuf>, state: ChangeState) {
        let path = path.into();
        {
            let mut states = self.states.write();
            match states.iter_mut().find(|entry| entry.path == path) {
                Some(entry) => entry.state = state,
                None => states.push(ResourceState::new(path.clone(), state)),
            }
        }

        self.notifier.notify(ChangeEvent {
            path,
            state: Some(state),
        });
    }

    /// Drop the entry for `path` if there is one. Always notifies.
    pub fn remove(&self, path: &Path) {
        self.states.write().retain(|entry| entry.path != path);
        self.notifier.notify(ChangeEvent {
            path: path.to_path_buf(),
            state: None,
        });
    }

    /// Clear the whole list without notifying
    pub fn reset_all(&self) {
        self.states.write().clear();
    }

    /// Reclassify one working file. Paths that are not script files of this
    /// folder are ignored and yield `None`.
    pub async fn classify_path(&self, path: &Path) -> Result<Option<ChangeState>> {
        let layout = self.detector.store().layout();
        let Some(name) = layout.script_name(path) else {
            return Ok(None);
        };

        let state = self.detector.classify(&name).await?;
        self.apply(path.to_path_buf(), state);
        Ok(Some(state))
    }

    /// Reclassify every working file and every snapshot.
    ///
    /// Returns the number of pending changes afterwards.
    pub async fn rescan(&self) -> Result<usize> {
        let store = self.detector.store();
        let layout = store.layout();

        let mut names = layout.list_working_names()?;
        names.extend(store.names().await?);

        let mut visited = BTreeSet::new();
        for name in &names {
            let path = layout.working_path(name)?;
            let state = self.detector.classify(name).await?;
            self.apply(path.clone(), state);
            visited.insert(path);
        }

        let stale: Vec<PathBuf> = self
            .states
            .read()
            .iter()
            .filter(|entry| !visited.contains(&entry.path))
            .map(|entry| entry.path.clone())
            .collect();
        for path in stale {
            self.remove(&path);
        }

        let pending = self.len();
        debug!(folder = %layout.root().display(), scanned = names.len(), pending, "Rescanned folder");
        Ok(pending)
    }

    fn apply(&self, path: PathBuf, state: ChangeState) {
        if state.is_change() {
            self.upsert(path, state);
        } else {
            self.remove(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FolderLayout, WorkspaceOptions};
    use crate::snapshot::SnapshotStore;
    use scriptsync_core::Script;
    use tempfile::TempDir;
    use tokio::fs;

    fn tracker(root: &Path) -> (ChangeTracker, ChangeChannel) {
        let layout = FolderLayout::new(root, WorkspaceOptions::default()).unwrap();
        let detector = ChangeDetector::new(SnapshotStore::new(layout));
        let (notifier, channel) = ChangeChannel::new();
        (ChangeTracker::new(detector, Arc::new(notifier)), channel)
    }

    fn drain(channel: &mut ChangeChannel) -> Vec<ChangeEvent> {
        std::iter::from_fn(|| channel.try_recv()).collect()
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let (tracker, mut channel) = tracker(temp_dir.path());

        tracker.upsert("/w/a.ts", ChangeState::Created);
        tracker.upsert("/w/b.ts", ChangeState::Deleted);
        tracker.upsert("/w/a.ts", ChangeState::Modified);

        let states = tracker.states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], ResourceState::new("/w/a.ts", ChangeState::Modified));
        assert_eq!(drain(&mut channel).len(), 3);
    }

    #[test]
    fn test_remove_always_notifies() {
        let temp_dir = TempDir::new().unwrap();
        let (tracker, mut channel) = tracker(temp_dir.path());

        tracker.remove(Path::new("/w/missing.ts"));
        let events = drain(&mut channel);
        assert_eq!(
            events,
            vec![ChangeEvent {
                path: PathBuf::from("/w/missing.ts"),
                state: None
            }]
        );
    }

    #[test]
    fn test_reset_all_is_silent() {
        let temp_dir = TempDir::new().unwrap();
        let (tracker, mut channel) = tracker(temp_dir.path());

        tracker.upsert("/w/a.ts", ChangeState::Created);
        drain(&mut channel);

        tracker.reset_all();
        assert!(tracker.is_empty());
        assert!(drain(&mut channel).is_empty());
    }

    #[tokio::test]
    async fn test_rescan_reports_every_kind_of_change() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tracker, _channel) = tracker(root);

        let scripts: Vec<Script> = ["kept", "edited", "removed"]
            .iter()
            .enumerate()
            .map(|(i, name)| Script {
                id: i as u64,
                name: name.to_string(),
                content: format!("{} v1", name),
                enabled: true,
            })
            .collect();
        tracker.detector().store().rebuild(&scripts).await.unwrap();

        fs::write(root.join("kept.ts"), "kept v1").await.unwrap();
        fs::write(root.join("edited.ts"), "edited v2").await.unwrap();
        fs::write(root.join("fresh.ts"), "fresh").await.unwrap();
        fs::write(root.join("readme.md"), "ignored").await.unwrap();

        assert_eq!(tracker.rescan().await.unwrap(), 3);
        assert_eq!(tracker.get(&root.join("edited.ts")), Some(ChangeState::Modified));
        assert_eq!(tracker.get(&root.join("removed.ts")), Some(ChangeState::Deleted));
        assert_eq!(tracker.get(&root.join("fresh.ts")), Some(ChangeState::Created));
        assert_eq!(tracker.get(&root.join("kept.ts")), None);
    }

    #[tokio::test]
    async fn test_rescan_drops_entries_for_vanished_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tracker, _channel) = tracker(root);

        fs::write(root.join("draft.ts"), "draft").await.unwrap();
        tracker.rescan().await.unwrap();
        assert_eq!(tracker.len(), 1);

        fs::remove_file(root.join("draft.ts")).await.unwrap();
        assert_eq!(tracker.rescan().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_classify_path_ignores_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tracker, _channel) = tracker(root);

        fs::write(root.join("notes.md"), "x").await.unwrap();
        fs::write(root.join("new.ts"), "x").await.unwrap();

        assert_eq!(tracker.classify_path(&root.join("notes.md")).await.unwrap(), None);
        assert_eq!(
            tracker.classify_path(&root.join("new.ts")).await.unwrap(),
            Some(ChangeState::Created)
        );
        assert_eq!(tracker.len(), 1);
    }
}
