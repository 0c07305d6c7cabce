use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

use super::types::ScriptId;

/// The remote call an error was raised by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOperation {
    ListGuilds,
    ListScripts { guild_id: String },
    CreateScript { guild_id: String, name: String },
    UpdateScript { guild_id: String, id: ScriptId },
    DeleteScript { guild_id: String, id: ScriptId },
    ReloadContainer { guild_id: String },
}

impl RemoteOperation {
    pub fn guild_id(&self) -> Option<&str> {
        match self {
            RemoteOperation::ListGuilds => None,
            RemoteOperation::ListScripts { guild_id }
            | RemoteOperation::CreateScript { guild_id, .. }
            | RemoteOperation::UpdateScript { guild_id, .. }
            | RemoteOperation::DeleteScript { guild_id, .. }
            | RemoteOperation::ReloadContainer { guild_id } => Some(guild_id),
        }
    }

    pub fn script_id(&self) -> Option<ScriptId> {
        match self {
            RemoteOperation::UpdateScript { id, .. } | RemoteOperation::DeleteScript { id, .. } => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteOperation::ListGuilds => write!(f, "list guilds"),
            RemoteOperation::ListScripts { guild_id } => write!(f, "list scripts of guild {}", guild_id),
            RemoteOperation::CreateScript { guild_id, name } => {
                write!(f, "create script '{}' in guild {}", name, guild_id)
            }
            RemoteOperation::UpdateScript { guild_id, id } => write!(f, "update script {} in guild {}", id, guild_id),
            RemoteOperation::DeleteScript { guild_id, id } => write!(f, "delete script {} in guild {}", id, guild_id),
            RemoteOperation::ReloadContainer { guild_id } => write!(f, "reload guild {}", guild_id),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not set up the HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Could not {operation}: {source}")]
    Transport {
        operation: RemoteOperation,
        #[source]
        source: reqwest::Error,
    },

    #[error("Could not {operation}: unreadable response: {source}")]
    Decode {
        operation: RemoteOperation,
        #[source]
        source: serde_json::Error,
    },

    /// 401 or 403
    #[error("Could not {operation}: access denied ({status}): {message}")]
    Denied {
        operation: RemoteOperation,
        status: u16,
        message: String,
    },

    /// The script an update or delete targeted is no longer in the guild
    #[error("Script {id} no longer exists in guild {guild_id}")]
    ScriptGone { guild_id: String, id: ScriptId },

    #[error("Could not {operation}: not found")]
    NotFound { operation: RemoteOperation },

    #[error("Could not {operation}: rate limited (retry after {retry_after:?}s)")]
    RateLimited {
        operation: RemoteOperation,
        retry_after: Option<u64>,
    },

    #[error("Could not {operation}: server error ({status}): {message}")]
    Server {
        operation: RemoteOperation,
        status: u16,
        message: String,
    },

    /// Any other non-success status, usually a validation failure
    #[error("Could not {operation}: rejected ({status}): {message}")]
    Rejected {
        operation: RemoteOperation,
        status: u16,
        message: String,
    },
}

impl ClientError {
    /// Classify a non-success response of `operation`
    pub fn from_status(
        operation: RemoteOperation,
        status: StatusCode,
        retry_after: Option<u64>,
        message: String,
    ) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Denied {
                operation,
                status: status.as_u16(),
                message,
            },
            StatusCode::NOT_FOUND => match operation {
                RemoteOperation::UpdateScript { guild_id, id } | RemoteOperation::DeleteScript { guild_id, id } => {
                    ClientError::ScriptGone { guild_id, id }
                }
                operation => ClientError::NotFound { operation },
            },
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited { operation, retry_after },
            status if status.is_server_error() => ClientError::Server {
                operation,
                status: status.as_u16(),
                message,
            },
            status => ClientError::Rejected {
                operation,
                status: status.as_u16(),
                message,
            },
        }
    }

    /// The remote call that failed, when the error came from one
    pub fn operation(&self) -> Option<&RemoteOperation> {
        match self {
            ClientError::Transport { operation, .. }
            | ClientError::Decode { operation, .. }
            | ClientError::Denied { operation, .. }
            | ClientError::NotFound { operation }
            | ClientError::RateLimited { operation, .. }
            | ClientError::Server { operation, .. }
            | ClientError::Rejected { operation, .. } => Some(operation),
            ClientError::HttpClient(_) | ClientError::InvalidUrl(_) | ClientError::ScriptGone { .. } => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. } | ClientError::Server { .. } | ClientError::RateLimited { .. }
        )
    }

    /// Whether the error means the local record of a script is out of date
    pub fn is_stale(&self) -> bool {
        matches!(self, ClientError::ScriptGone { .. })
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ClientError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
