use async_trait::async_trait;
use std::sync::Arc;

use super::{error::Result, types::*};

/// Remote operations the sync engine depends on.
///
/// Implementations own transport concerns (authentication headers, timeouts,
/// retries). The engine treats every `Err` as a fetch failure.
#[async_trait]
pub trait ScriptClient: Send + Sync {
    /// List every script in the guild
    async fn list_scripts(&self, guild_id: &str) -> Result<Vec<Script>>;

    /// Create a script and return it with its new id
    async fn create_script(&self, guild_id: &str, draft: &ScriptDraft) -> Result<Script>;

    /// Replace the content of an existing script
    async fn update_script(&self, guild_id: &str, id: ScriptId, draft: &ScriptDraft) -> Result<Script>;

    /// Delete a script
    async fn delete_script(&self, guild_id: &str, id: ScriptId) -> Result<()>;

    /// Ask the guild's script runtime to reload
    async fn reload_container(&self, guild_id: &str) -> Result<()>;
}

#[async_trait]
impl<T: ScriptClient + ?Sized> ScriptClient for Arc<T> {
    async fn list_scripts(&self, guild_id: &str) -> Result<Vec<Script>> {
        (**self).list_scripts(guild_id).await
    }

    async fn create_script(&self, guild_id: &str, draft: &ScriptDraft) -> Result<Script> {
        (**self).create_script(guild_id, draft).await
    }

    async fn update_script(&self, guild_id: &str, id: ScriptId, draft: &ScriptDraft) -> Result<Script> {
        (**self).update_script(guild_id, id, draft).await
    }

    async fn delete_script(&self, guild_id: &str, id: ScriptId) -> Result<()> {
        (**self).delete_script(guild_id, id).await
    }

    async fn reload_container(&self, guild_id: &str) -> Result<()> {
        (**self).reload_container(guild_id).await
    }
}
