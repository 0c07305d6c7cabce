use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Remote identifier of a script
pub type ScriptId = u64;

/// A script as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub id: ScriptId,
    pub name: String,
    #[serde(alias = "original_source")]
    pub content: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Body of a create or update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDraft {
    pub name: String,
    #[serde(rename = "original_source")]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl ScriptDraft {
    /// Draft for a brand new script, enabled on creation
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            enabled: Some(true),
        }
    }

    /// Draft for a content update that leaves the enabled flag alone
    pub fn content_update(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            enabled: None,
        }
    }
}

/// Remote container owning a set of scripts.
///
/// Only `id` and `name` are interpreted; every other field the server sends is
/// kept verbatim so it survives a round trip through the workspace index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Guild {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: HashMap::new(),
        }
    }
}

/// Error body returned by the script store
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<u16>,
    pub message: String,
}

fn default_enabled() -> bool {
    true
}
