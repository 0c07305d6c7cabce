//! Push-direction pipeline: turns classified changes into remote mutations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use scriptsync_core::{ClientError, ScriptClient, ScriptDraft, ScriptId};

use crate::error::{Result, SyncError};
use crate::index::WorkspaceIndex;
use crate::reconcile::{ReconcileSummary, ReconciliationEngine};
use crate::state::{ChangeState, ResourceState};

/// Result of pushing one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum PushResult {
    Created { id: ScriptId },
    Updated,
    Deleted,
    Skipped { reason: String },
    Failed { error: String },
}

impl PushResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, PushResult::Failed { .. })
    }
}

/// Per-entry push report
#[derive(Debug, Clone, Serialize)]
pub struct PushOutcome {
    pub path: PathBuf,
    pub name: Option<String>,
    pub state: ChangeState,
    pub result: PushResult,
}

/// Report for a whole push batch
#[derive(Debug)]
pub struct PushReport {
    pub batch_id: Uuid,
    pub outcomes: Vec<PushOutcome>,
    /// The reconciliation pass run after the batch
    pub reconcile: Result<ReconcileSummary>,
    /// The reload signal sent after reconciliation
    pub reload: std::result::Result<(), ClientError>,
}

impl PushReport {
    pub fn failures(&self) -> impl Iterator<Item = &PushOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_failure())
    }

    /// Whether every entry and both closing steps succeeded
    pub fn is_successful(&self) -> bool {
        self.failures().next().is_none() && self.reconcile.is_ok() && self.reload.is_ok()
    }
}

/// Sends local changes of one folder to the remote store
pub struct PushEngine {
    client: Arc<dyn ScriptClient>,
    reconciler: Arc<ReconciliationEngine>,
}

impl PushEngine {
    pub fn new(client: Arc<dyn ScriptClient>, reconciler: Arc<ReconciliationEngine>) -> Self {
        Self { client, reconciler }
    }

    /// Push every entry, then reconcile and reload regardless of failures.
    ///
    /// Only an unusable workspace index fails the call; remote failures are
    /// recorded per entry.
    #[instrument(skip(self, entries), fields(folder = %self.reconciler.layout().root().display(), batch_id = tracing::field::Empty))]
    pub async fn push(&self, entries: &[ResourceState]) -> Result<PushReport> {
        let batch_id = Uuid::new_v4();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));

        let index = self.reconciler.tracker().detector().store().load_index().await?;
        info!(entries = entries.len(), guild = %index.guild_id(), "Pushing changes");

        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(self.push_one(&index, entry).await);
        }

        let reconcile = self.reconciler.reconcile().await;
        if let Err(e) = &reconcile {
            warn!("Reconciliation after push failed: {}", e);
        }

        let reload = self.client.reload_container(index.guild_id()).await;
        if let Err(e) = &reload {
            warn!("Failed to reload guild runtime: {}", e);
        }

        let failed = outcomes.iter().filter(|o| o.result.is_failure()).count();
        info!(pushed = outcomes.len() - failed, failed, "Push batch finished");

        Ok(PushReport {
            batch_id,
            outcomes,
            reconcile,
            reload,
        })
    }

    async fn push_one(&self, index: &WorkspaceIndex, entry: &ResourceState) -> PushOutcome {
        let name = self.reconciler.layout().script_name(&entry.path);

        let result = match &name {
            None => PushResult::Skipped {
                reason: "not a script file of this folder".to_string(),
            },
            Some(name) => match self.execute(index, name, entry).await {
                Ok(result) => result,
                Err(e) if e.is_stale() => {
                    warn!("Skipping push: {}", e);
                    PushResult::Skipped { reason: e.to_string() }
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), "Push failed: {}", e);
                    PushResult::Failed { error: e.to_string() }
                }
            },
        };

        PushOutcome {
            path: entry.path.clone(),
            name,
            state: entry.state,
            result,
        }
    }

    async fn execute(&self, index: &WorkspaceIndex, name: &str, entry: &ResourceState) -> Result<PushResult> {
        let guild_id = index.guild_id();
        let tracked_id = |name: &str| {
            index
                .find_by_name(name)
                .map(|script| script.id)
                .ok_or_else(|| SyncError::StaleLookup {
                    name: name.to_string(),
                })
        };

        match entry.state {
            ChangeState::Unmodified => Ok(PushResult::Skipped {
                reason: "no pending change".to_string(),
            }),
            ChangeState::Created => {
                let content = read_script(&entry.path).await?;
                let script = self
                    .client
                    .create_script(guild_id, &ScriptDraft::new(name, content))
                    .await?;
                debug!(name, id = script.id, "Created remote script");
                Ok(PushResult::Created { id: script.id })
            }
            ChangeState::Modified => {
                let id = tracked_id(name)?;
                let content = read_script(&entry.path).await?;
                self.client
                    .update_script(guild_id, id, &ScriptDraft::content_update(name, content))
                    .await?;
                debug!(name, id, "Updated remote script");
                Ok(PushResult::Updated)
            }
            ChangeState::Deleted => {
                let id = tracked_id(name)?;
                self.client.delete_script(guild_id, id).await?;
                debug!(name, id, "Deleted remote script");
                Ok(PushResult::Deleted)
            }
        }
    }
}

async fn read_script(path: &Path) -> Result<String> {
    let bytes = fs::read(path).await.map_err(|e| {
        SyncError::path_error(path, format!("Failed to read script: {}", e))
    })?;
    String::from_utf8(bytes).map_err(|_| SyncError::path_error(path, "Script is not valid UTF-8"))
}
