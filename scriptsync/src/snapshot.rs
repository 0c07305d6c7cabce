//! On-disk baseline for change detection: one snapshot file per tracked
//! script plus the workspace index.
//!
//! Layout inside the tracked folder:
//!
//! ```text
//! <state_dir>/index.json
//! <state_dir>/snapshots/<name>.<ext>.snapshot
//! ```

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use scriptsync_core::Script;

use crate::error::{Result, SyncError};
use crate::index::WorkspaceIndex;
use crate::layout::FolderLayout;

/// Snapshot and index storage for one tracked folder
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    layout: FolderLayout,
}

impl SnapshotStore {
    pub fn new(layout: FolderLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FolderLayout {
        &self.layout
    }

    /// Whether the folder has ever been bound to a guild
    pub async fn is_initialized(&self) -> bool {
        fs::metadata(self.layout.index_path()).await.is_ok()
    }

    /// Load the workspace index. A missing or unparsable index is reported
    /// as [`SyncError::IndexCorrupt`].
    pub async fn load_index(&self) -> Result<WorkspaceIndex> {
        let path = self.layout.index_path();

        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::index_corrupt(&path, "index file is missing"));
            }
            Err(e) => return Err(SyncError::index_corrupt(&path, e.to_string())),
        };

        serde_json::from_slice(&content).map_err(|e| SyncError::index_corrupt(&path, e.to_string()))
    }

    /// Replace the workspace index with write-to-temp-then-rename
    pub async fn save_index(&self, index: &WorkspaceIndex) -> Result<()> {
        let path = self.layout.index_path();
        let content = serde_json::to_vec_pretty(index)?;
        write_atomic(&path, &content).await
    }

    pub fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        self.layout.snapshot_path_in(&self.layout.snapshot_dir(), name)
    }

    /// Snapshot content for a script, or `None` if there is none
    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.snapshot_path(name)?;
        match fs::read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::path_error(path, format!("Failed to read snapshot: {}", e))),
        }
    }

    /// Names of every script that currently has a snapshot
    pub async fn names(&self) -> Result<BTreeSet<String>> {
        let dir = self.layout.snapshot_dir();
        let mut names = BTreeSet::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(SyncError::path_error(dir, format!("Failed to list snapshots: {}", e))),
        };

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str().and_then(|f| self.layout.snapshot_name(f)) {
                names.insert(name);
            }
        }

        Ok(names)
    }

    /// Throw away every snapshot and write one per script.
    ///
    /// The new set is written into a staging directory first and swapped in
    /// with renames, so readers see either the old set or the new one.
    pub async fn rebuild(&self, scripts: &[Script]) -> Result<()> {
        let live = self.layout.snapshot_dir();
        let staging = live.with_extension("staging");
        let retired = live.with_extension("old");

        remove_dir_if_present(&staging).await?;
        if fs::metadata(&live).await.is_err() && fs::metadata(&retired).await.is_ok() {
            // An earlier swap stopped halfway; the retired set is the last good one
            warn!(dir = %retired.display(), "Restoring snapshots left by an interrupted rebuild");
            rename_dir(&retired, &live).await?;
        }
        remove_dir_if_present(&retired).await?;
        fs::create_dir_all(&staging).await.map_err(|e| {
            SyncError::path_error(&staging, format!("Failed to create snapshot directory: {}", e))
        })?;

        for script in scripts {
            let path = self.layout.snapshot_path_in(&staging, &script.name)?;
            fs::write(&path, script.content.as_bytes()).await.map_err(|e| {
                SyncError::path_error(&path, format!("Failed to write snapshot: {}", e))
            })?;
        }

        swap_directories(&staging, &live, &retired).await?;

        debug!(count = scripts.len(), dir = %live.display(), "Rebuilt snapshots");
        Ok(())
    }

    /// Remove the index and every snapshot
    pub async fn destroy(&self) -> Result<()> {
        let state_dir = self.layout.state_dir();
        if remove_dir_if_present(&state_dir).await? {
            debug!(dir = %state_dir.display(), "Removed workspace state");
        } else {
            warn!(dir = %state_dir.display(), "No workspace state to remove");
        }
        Ok(())
    }
}

async fn remove_dir_if_present(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SyncError::path_error(path, format!("Failed to delete directory: {}", e))),
    }
}

/// Move `staging` into place as `live`, parking the previous `live` at
/// `retired` until the swap succeeds. On failure `live` is put back.
async fn swap_directories(staging: &Path, live: &Path, retired: &Path) -> Result<()> {
    let had_live = fs::metadata(live).await.is_ok();
    if had_live {
        rename_dir(live, retired).await?;
    }

    if let Err(e) = rename_dir(staging, live).await {
        if had_live {
            rename_dir(retired, live).await?;
        }
        return Err(e);
    }

    remove_dir_if_present(retired).await?;
    Ok(())
}

async fn rename_dir(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).await.map_err(|e| {
        SyncError::path_error(from, format!("Failed to move to '{}': {}", to.display(), e))
    })
}

/// Write content to a temp file next to `path`, then rename it into place
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            SyncError::path_error(parent, format!("Failed to create directory: {}", e))
        })?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, content).await.map_err(|e| {
        SyncError::path_error(&temp_path, format!("Failed to write file: {}", e))
    })?;
    fs::rename(&temp_path, path).await.map_err(|e| {
        SyncError::path_error(path, format!("Failed to replace file: {}", e))
    })?;

    Ok(())
}
