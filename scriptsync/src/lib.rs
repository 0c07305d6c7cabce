//! Script Sync Engine Library
//!
//! Keeps local folders consistent with a remote script store:
//! - Content hashing and per-file change classification
//! - Snapshot store holding the last known remote state
//! - Reconciliation that never discards local edits
//! - Push pipeline with per-entry failure reporting
//! - Folder registry and file watching

pub mod error;
pub mod hasher;
pub mod state;
pub mod layout;
pub mod index;
pub mod snapshot;
pub mod detector;
pub mod tracker;
pub mod reconcile;
pub mod push;
pub mod folder;
pub mod registry;
pub mod watcher;

// Re-export main types
pub use error::{SyncError, Result};
pub use hasher::{ContentHasher, HashAlgorithm};
pub use state::{ChangeState, Decoration, ResourceState};
pub use layout::{FolderLayout, WorkspaceOptions};
pub use index::{TrackedScript, WorkspaceIndex};
pub use snapshot::SnapshotStore;
pub use detector::ChangeDetector;
pub use tracker::{ChangeChannel, ChangeEvent, ChangeNotifier, ChangeTracker, ChannelNotifier, NoopNotifier};
pub use reconcile::{ReconcileSummary, ReconciliationEngine};
pub use push::{PushEngine, PushOutcome, PushReport, PushResult};
pub use folder::TrackedFolder;
pub use registry::WorkspaceRegistry;
pub use watcher::FolderWatcher;

/// Open a folder that is already bound and rebuild its change list
pub async fn open_folder(
    root: impl Into<std::path::PathBuf>,
    options: WorkspaceOptions,
    client: std::sync::Arc<dyn scriptsync_core::ScriptClient>,
) -> Result<TrackedFolder> {
    let folder = TrackedFolder::new(root, options, client, std::sync::Arc::new(NoopNotifier))?;
    folder.index().await?;
    folder.refresh().await?;
    Ok(folder)
}

// Test modules
#[cfg(test)]
mod testing;
