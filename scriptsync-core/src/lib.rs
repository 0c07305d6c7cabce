//! Core script store library
//!
//! This crate provides the remote side of script synchronization: the data
//! types exchanged with the script store, the [`ScriptClient`] contract the
//! sync engine consumes, and an HTTP implementation of that contract.

pub mod api;

use serde::{Deserialize, Serialize};

pub use api::{
    ClientError, Guild, HttpScriptClient, HttpScriptClientBuilder, RemoteOperation, Result, Script,
    ScriptClient, ScriptDraft, ScriptId,
};

/// Connection settings for the remote script store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    /// Bearer token sent with every request. Never persisted by the engine.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on the time spent retrying transient failures. Zero disables retries.
    #[serde(default = "default_max_retry_secs")]
    pub max_retry_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7447/api".to_string(),
            token: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retry_secs: default_max_retry_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Build an HTTP client from these settings
    pub fn build_client(&self) -> Result<HttpScriptClient> {
        let mut builder = HttpScriptClientBuilder::new(&self.base_url)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(self.connect_timeout_secs))
            .max_retry(std::time::Duration::from_secs(self.max_retry_secs))
            .user_agent(&self.user_agent);

        if let Some(token) = &self.token {
            builder = builder.token(token);
        }

        builder.build()
    }
}

fn default_timeout_secs() -> u64 { 30 }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_max_retry_secs() -> u64 { 60 }
fn default_user_agent() -> String { format!("scriptsync/{}", env!("CARGO_PKG_VERSION")) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:7447/api");
        assert!(config.token.is_none());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_client_config_fills_missing_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "base_url": "https://scripts.example.com/api" }"#).unwrap();
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.max_retry_secs, 60);
        assert!(config.user_agent.starts_with("scriptsync/"));
    }

    #[test]
    fn test_build_client_rejects_bad_url() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.build_client(), Err(ClientError::InvalidUrl(_))));
    }
}
