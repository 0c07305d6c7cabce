//! Per-file change classification and how each class is presented

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Classification of a working file against its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    Unmodified,
    Created,
    Modified,
    Deleted,
}

/// Display attributes for a change state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoration {
    pub label: &'static str,
    /// Single-letter badge shown next to the file name
    pub badge: &'static str,
    pub tooltip: &'static str,
    /// Theme color identifier
    pub color: &'static str,
}

impl ChangeState {
    /// Whether the state is something worth pushing
    pub fn is_change(self) -> bool {
        !matches!(self, ChangeState::Unmodified)
    }

    pub fn decoration(self) -> Decoration {
        match self {
            ChangeState::Unmodified => Decoration {
                label: "Unmodified",
                badge: "",
                tooltip: "In sync with the remote script",
                color: "foreground",
            },
            ChangeState::Created => Decoration {
                label: "Added",
                badge: "A",
                tooltip: "New script, not yet pushed",
                color: "gitDecoration.addedResourceForeground",
            },
            ChangeState::Modified => Decoration {
                label: "Modified",
                badge: "M",
                tooltip: "Local edits not yet pushed",
                color: "gitDecoration.modifiedResourceForeground",
            },
            ChangeState::Deleted => Decoration {
                label: "Deleted",
                badge: "D",
                tooltip: "Deleted locally, still present remotely",
                color: "gitDecoration.deletedResourceForeground",
            },
        }
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.decoration().label)
    }
}

/// A pending change held by the change tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Working file path
    pub path: PathBuf,
    pub state: ChangeState,
}

impl ResourceState {
    pub fn new(path: impl Into<PathBuf>, state: ChangeState) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }
}
