//! Pull-direction reconciliation: merges the remote script list into a
//! tracked folder without ever discarding a local edit.
//!
//! Policy summary:
//! - files with no pending local change follow upstream (overwrite, delete)
//! - remote scripts with no working file are materialized
//! - files with a pending local change are never touched
//! - the snapshot directory and the index always mirror the latest fetch

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use scriptsync_core::{Script, ScriptClient};

use crate::error::{Result, SyncError};
use crate::index::WorkspaceIndex;
use crate::layout::FolderLayout;
use crate::state::ChangeState;
use crate::tracker::ChangeTracker;

/// What a reconciliation pass did
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    /// Scripts returned by the remote store
    pub fetched: usize,
    /// Working files created for scripts that had none
    pub materialized: Vec<String>,
    /// Untouched working files updated to new remote content
    pub overwritten: Vec<String>,
    /// Untouched working files deleted because the script was deleted upstream
    pub removed: Vec<String>,
    /// Working files left alone because they carry local changes
    pub preserved: Vec<String>,
    /// Remote scripts excluded by the name containment check
    pub rejected: Vec<String>,
    /// Pending changes after the closing rescan
    pub pending_changes: usize,
    pub completed_at: DateTime<Utc>,
}

impl ReconcileSummary {
    /// Whether the pass changed any working file
    pub fn touched_working_files(&self) -> bool {
        !(self.materialized.is_empty() && self.overwritten.is_empty() && self.removed.is_empty())
    }
}

/// Runs reconciliation passes for one tracked folder.
///
/// Not synchronized on its own; callers serialize passes per folder.
pub struct ReconciliationEngine {
    client: Arc<dyn ScriptClient>,
    tracker: Arc<ChangeTracker>,
}

impl ReconciliationEngine {
    pub fn new(client: Arc<dyn ScriptClient>, tracker: Arc<ChangeTracker>) -> Self {
        Self { client, tracker }
    }

    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    pub fn layout(&self) -> &FolderLayout {
        self.tracker.detector().store().layout()
    }

    /// Bring the folder in line with the remote script list
    #[instrument(skip(self), fields(folder = %self.layout().root().display()))]
    pub async fn reconcile(&self) -> Result<ReconcileSummary> {
        let detector = self.tracker.detector();
        let store = detector.store();
        let layout = store.layout();

        let previous = store.load_index().await?;

        // Files with no pending local change may follow upstream. Symlinks
        // never do: writing through them would touch files outside the folder.
        let working_names = layout.list_working_names()?;
        let mut safe_to_overwrite = BTreeSet::new();
        for name in &working_names {
            if is_symlink(&layout.working_path(name)?).await {
                debug!(name = %name, "Working file is a symlink; leaving it alone");
                continue;
            }
            if detector.classify(name).await? == ChangeState::Unmodified {
                safe_to_overwrite.insert(name.clone());
            }
        }

        // Nothing below runs if the fetch fails
        let fetched = self.client.list_scripts(previous.guild_id()).await?;
        let fetched_count = fetched.len();
        let (scripts, rejected) = self.contained_scripts(fetched);

        store.rebuild(&scripts).await?;
        store
            .save_index(&WorkspaceIndex::from_scripts(previous.guild.clone(), &scripts))
            .await?;

        let mut materialized = Vec::new();
        let mut overwritten = Vec::new();
        let mut preserved = Vec::new();

        for script in &scripts {
            let path = layout.working_path(&script.name)?;

            if !working_names.contains(&script.name) {
                write_working_file(&path, script).await?;
                debug!(name = %script.name, "Materialized new script");
                materialized.push(script.name.clone());
            } else if fs::read(&path).await.ok().as_deref() == Some(script.content.as_bytes()) {
                // Already matches upstream, nothing to write or keep
            } else if safe_to_overwrite.contains(&script.name) {
                write_working_file(&path, script).await?;
                debug!(name = %script.name, "Updated script from remote");
                overwritten.push(script.name.clone());
            } else {
                debug!(name = %script.name, "Keeping local changes");
                preserved.push(script.name.clone());
            }
        }

        let remote_names: BTreeSet<&str> = scripts.iter().map(|s| s.name.as_str()).collect();
        let mut removed = Vec::new();

        for tracked in &previous.open_scripts {
            if remote_names.contains(tracked.name.as_str()) {
                continue;
            }

            if safe_to_overwrite.contains(&tracked.name) {
                let path = layout.working_path(&tracked.name)?;
                match fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(SyncError::path_error(path, format!("Failed to delete file: {}", e)));
                    }
                }
                debug!(name = %tracked.name, "Removed script deleted upstream");
                removed.push(tracked.name.clone());
            } else if working_names.contains(&tracked.name) {
                warn!(
                    name = %tracked.name,
                    "Script was deleted upstream but has local edits; keeping it as an untracked file"
                );
                preserved.push(tracked.name.clone());
            }
        }

        self.tracker.reset_all();
        let pending_changes = self.tracker.rescan().await?;

        let summary = ReconcileSummary {
            fetched: fetched_count,
            materialized,
            overwritten,
            removed,
            preserved,
            rejected,
            pending_changes,
            completed_at: Utc::now(),
        };

        info!(
            fetched = summary.fetched,
            materialized = summary.materialized.len(),
            overwritten = summary.overwritten.len(),
            removed = summary.removed.len(),
            preserved = summary.preserved.len(),
            pending = summary.pending_changes,
            "Reconciliation complete"
        );

        Ok(summary)
    }

    /// Split the fetched list into scripts that map to a file inside the
    /// folder and the names that were refused.
    fn contained_scripts(&self, fetched: Vec<Script>) -> (Vec<Script>, Vec<String>) {
        let layout = self.layout();
        let mut seen = BTreeSet::new();
        let mut scripts = Vec::with_capacity(fetched.len());
        let mut rejected = Vec::new();

        for script in fetched {
            if let Err(e) = layout.check_name(&script.name) {
                warn!(id = script.id, "Ignoring remote script: {}", e);
                rejected.push(script.name);
                continue;
            }

            if !seen.insert(script.name.clone()) {
                warn!(id = script.id, name = %script.name, "Ignoring remote script with duplicate name");
                rejected.push(script.name);
                continue;
            }

            scripts.push(script);
        }

        (scripts, rejected)
    }
}

async fn is_symlink(path: &std::path::Path) -> bool {
    fs::symlink_metadata(path)
        .await
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

async fn write_working_file(path: &std::path::Path, script: &Script) -> Result<()> {
    fs::write(path, script.content.as_bytes()).await.map_err(|e| {
        SyncError::path_error(path, format!("Failed to write script: {}", e))
    })
}
