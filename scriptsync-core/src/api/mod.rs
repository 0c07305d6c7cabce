//! Script store API module
//!
//! Wraps the script store's REST API: listing, creating, updating and
//! deleting scripts inside a guild, plus the reload signal that restarts the
//! guild's script runtime. Transient failures are retried with exponential
//! backoff inside the HTTP client; callers never retry.

pub mod client;
pub mod error;
pub mod remote;
pub mod scripts;
pub mod types;

pub use client::{HttpScriptClient, HttpScriptClientBuilder};
pub use error::{ClientError, RemoteOperation, Result};
pub use remote::ScriptClient;
pub use types::*;
