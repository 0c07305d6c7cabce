//! The persisted mapping between a tracked folder and its remote guild

use serde::{Deserialize, Serialize};

use scriptsync_core::{Guild, Script, ScriptId};

/// A script the folder is tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedScript {
    pub id: ScriptId,
    pub name: String,
}

/// Contents of `index.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceIndex {
    pub guild: Guild,
    #[serde(rename = "openScripts", default)]
    pub open_scripts: Vec<TrackedScript>,
}

impl WorkspaceIndex {
    /// A fresh index with no scripts
    pub fn new(guild: Guild) -> Self {
        Self {
            guild,
            open_scripts: Vec::new(),
        }
    }

    /// Index listing exactly the given scripts, in order
    pub fn from_scripts<'a>(guild: Guild, scripts: impl IntoIterator<Item = &'a Script>) -> Self {
        Self {
            guild,
            open_scripts: scripts
                .into_iter()
                .map(|script| TrackedScript {
                    id: script.id,
                    name: script.name.clone(),
                })
                .collect(),
        }
    }

    pub fn guild_id(&self) -> &str {
        &self.guild.id
    }

    pub fn find_by_name(&self, name: &str) -> Option<&TrackedScript> {
        self.open_scripts.iter().find(|script| script.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }
}
