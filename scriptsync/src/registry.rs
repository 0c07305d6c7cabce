//! Explicit registry of the folders a process is tracking

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::fs;
use tracing::info;

use scriptsync_core::{Guild, ScriptClient};

use crate::error::{Result, SyncError};
use crate::folder::TrackedFolder;
use crate::layout::WorkspaceOptions;
use crate::reconcile::ReconcileSummary;
use crate::tracker::{ChangeNotifier, NoopNotifier};

/// Owns every [`TrackedFolder`], keyed by canonical root path
pub struct WorkspaceRegistry {
    client: Arc<dyn ScriptClient>,
    options: WorkspaceOptions,
    notifier: Arc<dyn ChangeNotifier>,
    folders: RwLock<HashMap<PathBuf, Arc<TrackedFolder>>>,
}

impl WorkspaceRegistry {
    pub fn new(client: Arc<dyn ScriptClient>, options: WorkspaceOptions) -> Self {
        Self::with_notifier(client, options, Arc::new(NoopNotifier))
    }

    pub fn with_notifier(
        client: Arc<dyn ScriptClient>,
        options: WorkspaceOptions,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            client,
            options,
            notifier,
            folders: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    /// Start tracking a folder that is already bound to a guild
    pub async fn add(&self, path: &Path) -> Result<Arc<TrackedFolder>> {
        let root = canonical_root(path).await?;
        self.ensure_untracked(&root)?;

        let folder = Arc::new(self.build_folder(root.clone())?);
        folder.index().await?;

        self.insert(root, folder.clone())?;
        Ok(folder)
    }

    /// Bind a folder to a guild, pull it, and start tracking it
    pub async fn bind(&self, path: &Path, guild: Guild) -> Result<(Arc<TrackedFolder>, ReconcileSummary)> {
        fs::create_dir_all(path).await.map_err(|e| {
            SyncError::path_error(path, format!("Failed to create folder: {}", e))
        })?;
        let root = canonical_root(path).await?;
        self.ensure_untracked(&root)?;

        let folder = Arc::new(self.build_folder(root.clone())?);
        let summary = folder.bind(guild).await?;

        self.insert(root, folder.clone())?;
        Ok((folder, summary))
    }

    /// Stop tracking a folder, leaving its files and state on disk
    pub async fn remove(&self, path: &Path) -> Result<Arc<TrackedFolder>> {
        let root = canonical_root(path).await?;
        let folder = self
            .folders
            .write()
            .remove(&root)
            .ok_or(SyncError::NotTracked { path: root.clone() })?;

        info!(folder = %root.display(), "Stopped tracking folder");
        Ok(folder)
    }

    /// Stop tracking a folder and delete its index and snapshots
    pub async fn unbind(&self, path: &Path) -> Result<()> {
        let folder = self.remove(path).await?;
        folder.unbind().await
    }

    pub fn get(&self, root: &Path) -> Option<Arc<TrackedFolder>> {
        self.folders.read().get(root).cloned()
    }

    /// The tracked folder a working file belongs to
    pub fn folder_for(&self, file: &Path) -> Option<Arc<TrackedFolder>> {
        let parent = file.parent()?;
        self.get(parent)
    }

    pub fn folders(&self) -> Vec<Arc<TrackedFolder>> {
        self.folders.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.folders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.read().is_empty()
    }

    /// Reconcile every tracked folder concurrently
    pub async fn sync_all(&self) -> Vec<(PathBuf, Result<ReconcileSummary>)> {
        let folders = self.folders();
        let results = join_all(folders.iter().map(|folder| folder.sync())).await;

        folders
            .iter()
            .map(|folder| folder.root().to_path_buf())
            .zip(results)
            .collect()
    }

    fn build_folder(&self, root: PathBuf) -> Result<TrackedFolder> {
        TrackedFolder::new(
            root,
            self.options.clone(),
            self.client.clone(),
            self.notifier.clone(),
        )
    }

    fn ensure_untracked(&self, root: &Path) -> Result<()> {
        if self.folders.read().contains_key(root) {
            return Err(SyncError::AlreadyTracked {
                path: root.to_path_buf(),
            });
        }
        Ok(())
    }

    fn insert(&self, root: PathBuf, folder: Arc<TrackedFolder>) -> Result<()> {
        let mut folders = self.folders.write();
        if folders.contains_key(&root) {
            return Err(SyncError::AlreadyTracked { path: root });
        }

        info!(folder = %root.display(), "Tracking folder");
        folders.insert(root, folder);
        Ok(())
    }
}

async fn canonical_root(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).await.map_err(|e| {
        SyncError::path_error(path, format!("Failed to resolve folder: {}", e))
    })
}
