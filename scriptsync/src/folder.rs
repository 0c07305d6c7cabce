//! One tracked folder and the serialized unit of work around it

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use scriptsync_core::{Guild, ScriptClient};

use crate::detector::ChangeDetector;
use crate::error::{Result, SyncError};
use crate::index::WorkspaceIndex;
use crate::layout::{FolderLayout, WorkspaceOptions};
use crate::push::{PushEngine, PushReport};
use crate::reconcile::{ReconcileSummary, ReconciliationEngine};
use crate::snapshot::SnapshotStore;
use crate::state::{ChangeState, ResourceState};
use crate::tracker::{ChangeNotifier, ChangeTracker};

/// A local folder bound to a remote guild.
///
/// Reconciliation, push, bind and unbind hold the folder's operation lock for
/// their whole duration. Watcher-driven classification does not take it.
pub struct TrackedFolder {
    layout: FolderLayout,
    tracker: Arc<ChangeTracker>,
    reconciler: Arc<ReconciliationEngine>,
    pusher: PushEngine,
    operation: Mutex<()>,
}

impl TrackedFolder {
    pub fn new(
        root: impl Into<PathBuf>,
        options: WorkspaceOptions,
        client: Arc<dyn ScriptClient>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Result<Self> {
        let layout = FolderLayout::new(root, options)?;
        let detector = ChangeDetector::new(SnapshotStore::new(layout.clone()));
        let tracker = Arc::new(ChangeTracker::new(detector, notifier));
        let reconciler = Arc::new(ReconciliationEngine::new(client.clone(), tracker.clone()));
        let pusher = PushEngine::new(client, reconciler.clone());

        Ok(Self {
            layout,
            tracker,
            reconciler,
            pusher,
            operation: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &FolderLayout {
        &self.layout
    }

    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    pub fn store(&self) -> &SnapshotStore {
        self.tracker.detector().store()
    }

    /// Current pending changes
    pub fn changes(&self) -> Vec<ResourceState> {
        self.tracker.states()
    }

    pub async fn index(&self) -> Result<WorkspaceIndex> {
        self.store().load_index().await
    }

    /// Bind the folder to a guild and pull its scripts
    pub async fn bind(&self, guild: Guild) -> Result<ReconcileSummary> {
        let _guard = self.operation.lock().await;

        if self.store().is_initialized().await {
            return Err(SyncError::AlreadyTracked {
                path: self.root().to_path_buf(),
            });
        }

        info!(folder = %self.root().display(), guild = %guild.id, "Binding folder");
        self.store().save_index(&WorkspaceIndex::new(guild)).await?;

        match self.reconciler.reconcile().await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                // Leave the folder unbound so the bind can be retried
                warn!(folder = %self.root().display(), "Bind failed, removing workspace state: {}", e);
                self.store().destroy().await?;
                self.tracker.reset_all();
                Err(e)
            }
        }
    }

    /// Pull remote changes into the folder
    pub async fn sync(&self) -> Result<ReconcileSummary> {
        let _guard = self.operation.lock().await;
        self.reconciler.reconcile().await
    }

    /// Push the given entries, then reconcile and reload
    pub async fn push(&self, entries: &[ResourceState]) -> Result<PushReport> {
        let _guard = self.operation.lock().await;
        self.pusher.push(entries).await
    }

    /// Push every change the tracker currently holds
    pub async fn push_all(&self) -> Result<PushReport> {
        let _guard = self.operation.lock().await;
        let entries = self.tracker.states();
        self.pusher.push(&entries).await
    }

    /// Reclassify the given files and push whatever they hold.
    /// Files without a pending change are reported as skipped.
    pub async fn push_paths(&self, paths: &[PathBuf]) -> Result<PushReport> {
        let _guard = self.operation.lock().await;

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let state = self
                .tracker
                .classify_path(path)
                .await?
                .unwrap_or(ChangeState::Unmodified);
            entries.push(ResourceState::new(path.clone(), state));
        }

        self.pusher.push(&entries).await
    }

    /// Rebuild the change list from disk
    pub async fn refresh(&self) -> Result<usize> {
        let _guard = self.operation.lock().await;
        self.tracker.reset_all();
        self.tracker.rescan().await
    }

    /// React to a watcher event for one file
    pub async fn handle_file_event(&self, path: &Path) -> Result<Option<ChangeState>> {
        self.tracker.classify_path(path).await
    }

    /// Drop the index and snapshots; working files stay
    pub async fn unbind(&self) -> Result<()> {
        let _guard = self.operation.lock().await;
        self.store().destroy().await?;
        self.tracker.reset_all();
        info!(folder = %self.root().display(), "Unbound folder");
        Ok(())
    }
}
