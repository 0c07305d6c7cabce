use super::{error::*, remote::ScriptClient, scripts::ScriptOperations, types::*};
use async_trait::async_trait;
use reqwest::ClientBuilder;
use std::time::Duration;
use tracing::{debug, info};

/// HTTP client for the script store
pub struct HttpScriptClient {
    /// Script and guild endpoints
    pub scripts: ScriptOperations,

    /// Base URL of the script store API, without a trailing slash
    base_url: String,
}

impl HttpScriptClient {
    /// Create a new client with default timeouts and no token
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        HttpScriptClientBuilder::new(base_url).build()
    }

    /// Create a new client around an existing HTTP client
    pub fn with_client(
        base_url: impl Into<String>,
        http_client: reqwest::Client,
        token: Option<String>,
        max_retry: Duration,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let scripts = ScriptOperations::new(http_client, base_url.clone(), token, max_retry);

        Ok(Self { scripts, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the guilds available to the configured token
    pub async fn list_guilds(&self) -> Result<Vec<Guild>> {
        debug!("Listing guilds");
        let guilds = self.scripts.list_guilds().await?;
        info!("Found {} guilds", guilds.len());
        Ok(guilds)
    }
}

#[async_trait]
impl ScriptClient for HttpScriptClient {
    async fn list_scripts(&self, guild_id: &str) -> Result<Vec<Script>> {
        debug!(guild_id, "Listing scripts");
        self.scripts.list(guild_id).await
    }

    async fn create_script(&self, guild_id: &str, draft: &ScriptDraft) -> Result<Script> {
        debug!(guild_id, name = %draft.name, "Creating script");
        self.scripts.create(guild_id, draft).await
    }

    async fn update_script(&self, guild_id: &str, id: ScriptId, draft: &ScriptDraft) -> Result<Script> {
        debug!(guild_id, id, name = %draft.name, "Updating script");
        self.scripts.update(guild_id, id, draft).await
    }

    async fn delete_script(&self, guild_id: &str, id: ScriptId) -> Result<()> {
        debug!(guild_id, id, "Deleting script");
        self.scripts.delete(guild_id, id).await
    }

    async fn reload_container(&self, guild_id: &str) -> Result<()> {
        debug!(guild_id, "Reloading guild runtime");
        self.scripts.reload(guild_id).await
    }
}

fn normalize_base_url(base_url: String) -> Result<String> {
    url::Url::parse(&base_url)?;
    Ok(base_url.trim_end_matches('/').to_string())
}

// Builder pattern for client configuration
pub struct HttpScriptClientBuilder {
    base_url: String,
    token: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    max_retry: Duration,
    user_agent: Option<String>,
}

impl HttpScriptClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            max_retry: Duration::from_secs(60),
            user_agent: None,
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn max_retry(mut self, max_retry: Duration) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> Result<HttpScriptClient> {
        let mut client_builder = ClientBuilder::new();

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(connect_timeout) = self.connect_timeout {
            client_builder = client_builder.connect_timeout(connect_timeout);
        }

        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        }

        let http_client = client_builder.build().map_err(ClientError::HttpClient)?;

        HttpScriptClient::with_client(self.base_url, http_client, self.token, self.max_retry)
    }
}
