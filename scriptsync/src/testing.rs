//! In-memory script store used by the tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use scriptsync_core::{ClientError, RemoteOperation, Script, ScriptClient, ScriptDraft, ScriptId};

#[derive(Default)]
struct MockState {
    scripts: BTreeMap<ScriptId, Script>,
    next_id: ScriptId,
    fail_list: bool,
    fail_names: HashSet<String>,
    list_gates: HashMap<String, Arc<Semaphore>>,
    reloads: usize,
    calls: Vec<String>,
}

/// Script store that keeps everything in memory and can be told to fail
#[derive(Default)]
pub struct MockScriptClient {
    state: Mutex<MockState>,
}

impl MockScriptClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts(scripts: &[(&str, &str)]) -> Self {
        let client = Self::new();
        for (name, content) in scripts {
            client.insert(name, content);
        }
        client
    }

    /// Add a script as if someone else created it
    pub fn insert(&self, name: &str, content: &str) -> ScriptId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.scripts.insert(
            id,
            Script {
                id,
                name: name.to_string(),
                content: content.to_string(),
                enabled: true,
            },
        );
        id
    }

    /// Change a script's content as if someone else edited it
    pub fn set_content(&self, name: &str, content: &str) {
        let mut state = self.state.lock();
        if let Some(script) = state.scripts.values_mut().find(|s| s.name == name) {
            script.content = content.to_string();
        }
    }

    /// Delete a script as if someone else removed it
    pub fn remove(&self, name: &str) {
        self.state.lock().scripts.retain(|_, s| s.name != name);
    }

    pub fn find(&self, name: &str) -> Option<Script> {
        self.state.lock().scripts.values().find(|s| s.name == name).cloned()
    }

    pub fn scripts(&self) -> Vec<Script> {
        self.state.lock().scripts.values().cloned().collect()
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    /// Make every create/update/delete of `name` fail
    pub fn fail_on(&self, name: &str) {
        self.state.lock().fail_names.insert(name.to_string());
    }

    /// Hold every later listing of `guild_id` until a permit is added to the
    /// returned semaphore. Each permit releases one listing.
    pub fn gate_lists(&self, guild_id: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().list_gates.insert(guild_id.to_string(), gate.clone());
        gate
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().reloads
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn check_failure(state: &MockState, operation: RemoteOperation, name: &str) -> Result<(), ClientError> {
        if state.fail_names.contains(name) {
            return Err(ClientError::Server {
                operation,
                status: 500,
                message: format!("injected failure for {}", name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptClient for MockScriptClient {
    async fn list_scripts(&self, guild_id: &str) -> Result<Vec<Script>, ClientError> {
        let gate = {
            let mut state = self.state.lock();
            state.calls.push(format!("list {}", guild_id));
            state.list_gates.get(guild_id).cloned()
        };
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut state = self.state.lock();
        state.calls.push(format!("listed {}", guild_id));
        if state.fail_list {
            return Err(ClientError::Server {
                operation: RemoteOperation::ListScripts {
                    guild_id: guild_id.to_string(),
                },
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(state.scripts.values().cloned().collect())
    }

    async fn create_script(&self, guild_id: &str, draft: &ScriptDraft) -> Result<Script, ClientError> {
        let operation = RemoteOperation::CreateScript {
            guild_id: guild_id.to_string(),
            name: draft.name.clone(),
        };
        let mut state = self.state.lock();
        state.calls.push(format!("create {}", draft.name));
        Self::check_failure(&state, operation.clone(), &draft.name)?;

        if state.scripts.values().any(|s| s.name == draft.name) {
            return Err(ClientError::Rejected {
                operation,
                status: 409,
                message: format!("{} already exists", draft.name),
            });
        }

        state.next_id += 1;
        let script = Script {
            id: state.next_id,
            name: draft.name.clone(),
            content: draft.content.clone(),
            enabled: draft.enabled.unwrap_or(true),
        };
        state.scripts.insert(script.id, script.clone());
        Ok(script)
    }

    async fn update_script(
        &self,
        guild_id: &str,
        id: ScriptId,
        draft: &ScriptDraft,
    ) -> Result<Script, ClientError> {
        let operation = RemoteOperation::UpdateScript {
            guild_id: guild_id.to_string(),
            id,
        };
        let mut state = self.state.lock();
        state.calls.push(format!("update {}", draft.name));
        Self::check_failure(&state, operation, &draft.name)?;

        let script = state.scripts.get_mut(&id).ok_or_else(|| ClientError::ScriptGone {
            guild_id: guild_id.to_string(),
            id,
        })?;
        script.name = draft.name.clone();
        script.content = draft.content.clone();
        if let Some(enabled) = draft.enabled {
            script.enabled = enabled;
        }
        Ok(script.clone())
    }

    async fn delete_script(&self, guild_id: &str, id: ScriptId) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        let name = state
            .scripts
            .get(&id)
            .map(|s| s.name.clone())
            .ok_or_else(|| ClientError::ScriptGone {
                guild_id: guild_id.to_string(),
                id,
            })?;
        state.calls.push(format!("delete {}", name));
        let operation = RemoteOperation::DeleteScript {
            guild_id: guild_id.to_string(),
            id,
        };
        Self::check_failure(&state, operation, &name)?;

        state.scripts.remove(&id);
        Ok(())
    }

    async fn reload_container(&self, _guild_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.calls.push("reload".to_string());
        state.reloads += 1;
        Ok(())
    }
}
