use super::{error::*, types::*};
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{header::RETRY_AFTER, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Script and guild endpoints of the script store
pub struct ScriptOperations {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    max_retry: Duration,
}

impl ScriptOperations {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        token: Option<String>,
        max_retry: Duration,
    ) -> Self {
        Self {
            client,
            base_url,
            token,
            max_retry,
        }
    }

    /// List the guilds the current token can manage
    pub async fn list_guilds(&self) -> Result<Vec<Guild>> {
        let operation = RemoteOperation::ListGuilds;
        let url = self.endpoint("/guilds");
        let response = self.send(&operation, || self.client.get(&url)).await?;
        decode(response, &operation).await
    }

    /// List all scripts of a guild
    pub async fn list(&self, guild_id: &str) -> Result<Vec<Script>> {
        let operation = RemoteOperation::ListScripts {
            guild_id: guild_id.to_string(),
        };
        let url = self.scripts_url(guild_id);
        let response = self.send(&operation, || self.client.get(&url)).await?;
        decode(response, &operation).await
    }

    /// Create a script
    pub async fn create(&self, guild_id: &str, draft: &ScriptDraft) -> Result<Script> {
        let operation = RemoteOperation::CreateScript {
            guild_id: guild_id.to_string(),
            name: draft.name.clone(),
        };
        let url = self.scripts_url(guild_id);
        let response = self.send(&operation, || self.client.put(&url).json(draft)).await?;
        decode(response, &operation).await
    }

    /// Update an existing script. A script deleted upstream yields
    /// [`ClientError::ScriptGone`].
    pub async fn update(&self, guild_id: &str, id: ScriptId, draft: &ScriptDraft) -> Result<Script> {
        let operation = RemoteOperation::UpdateScript {
            guild_id: guild_id.to_string(),
            id,
        };
        let url = self.script_url(guild_id, id);
        let response = self.send(&operation, || self.client.patch(&url).json(draft)).await?;
        decode(response, &operation).await
    }

    /// Delete a script
    pub async fn delete(&self, guild_id: &str, id: ScriptId) -> Result<()> {
        let operation = RemoteOperation::DeleteScript {
            guild_id: guild_id.to_string(),
            id,
        };
        let url = self.script_url(guild_id, id);
        self.send(&operation, || self.client.delete(&url)).await?;
        Ok(())
    }

    /// Reload the guild's script runtime
    pub async fn reload(&self, guild_id: &str) -> Result<()> {
        let operation = RemoteOperation::ReloadContainer {
            guild_id: guild_id.to_string(),
        };
        let url = self.endpoint(&format!("/guilds/{}/reloadvm", guild_id));
        self.send(&operation, || self.client.post(&url)).await?;
        Ok(())
    }

    // Helper methods

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn scripts_url(&self, guild_id: &str) -> String {
        self.endpoint(&format!("/guilds/{}/scripts", guild_id))
    }

    pub(crate) fn script_url(&self, guild_id: &str, id: ScriptId) -> String {
        self.endpoint(&format!("/guilds/{}/scripts/{}", guild_id, id))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, rebuilding it for every attempt. Non-success statuses
    /// are turned into errors before the retry decision is made.
    async fn send<F>(&self, operation: &RemoteOperation, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Some(self.max_retry),
            ..Default::default()
        };

        retry(policy, || {
            let request = self.authorize(build());
            async move {
                let outcome = match request.send().await {
                    Ok(response) => check_status(response, operation).await,
                    Err(source) => Err(ClientError::Transport {
                        operation: operation.clone(),
                        source,
                    }),
                };

                outcome.map_err(|error| {
                    if error.is_retryable() {
                        warn!("Retryable error occurred: {}", error);
                        match error.retry_after() {
                            Some(secs) => backoff::Error::retry_after(error, Duration::from_secs(secs)),
                            None => backoff::Error::transient(error),
                        }
                    } else {
                        debug!("Non-retryable error: {}", error);
                        backoff::Error::permanent(error)
                    }
                })
            }
        })
        .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, operation: &RemoteOperation) -> Result<T> {
    let body = response.bytes().await.map_err(|source| ClientError::Transport {
        operation: operation.clone(),
        source,
    })?;
    serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
        operation: operation.clone(),
        source,
    })
}

/// Turn a non-success response into the error for `operation`
async fn check_status(response: Response, operation: &RemoteOperation) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(ClientError::from_status(operation.clone(), status, retry_after, error_message(&body)))
}

/// The store's `{ "message": ... }` body, or the raw text when it sent something else
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error) => error.message,
        Err(_) => body.trim().to_string(),
    }
}
