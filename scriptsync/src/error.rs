//! Error types for the sync engine library

use std::path::PathBuf;

use scriptsync_core::ClientError;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A remote call failed
    #[error("Remote request failed: {0}")]
    Fetch(#[from] ClientError),

    /// The workspace index is missing or unreadable
    #[error("Workspace index at '{path}' is unusable: {message}")]
    IndexCorrupt { path: PathBuf, message: String },

    /// A remote script name would resolve outside the tracked folder
    #[error("Script name '{name}' escapes the tracked folder")]
    NameEscape { name: String },

    /// A pushed change refers to a script the index no longer lists
    #[error("Script '{name}' is not in the workspace index")]
    StaleLookup { name: String },

    /// The folder is not registered
    #[error("Folder '{path}' is not tracked")]
    NotTracked { path: PathBuf },

    /// The folder is already registered
    #[error("Folder '{path}' is already tracked")]
    AlreadyTracked { path: PathBuf },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path-related errors
    #[error("Path error at '{path}': {message}")]
    Path { path: PathBuf, message: String },

    /// Hash computation errors
    #[error("Hash computation error for '{path}': {message}")]
    Hash { path: PathBuf, message: String },

    /// Glob pattern errors
    #[error("Filter pattern error: {0}")]
    FilterPattern(#[from] globset::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File watcher errors
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl SyncError {
    /// Create a new path error
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new hash error
    pub fn hash_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new index error
    pub fn index_corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error means a change targets a script that no longer
    /// exists, locally in the index or upstream
    pub fn is_stale(&self) -> bool {
        match self {
            Self::StaleLookup { .. } => true,
            Self::Fetch(e) => e.is_stale(),
            _ => false,
        }
    }

    /// Whether the error means the folder has never been bound
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::IndexCorrupt { .. })
    }
}
