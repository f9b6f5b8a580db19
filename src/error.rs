use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LavaError {
    /// The spawned process wrote to stderr. Treated as failure regardless of exit status.
    #[error("Remote or local command failed: {0}")]
    Transport(String),
    #[error("Failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' did not finish within {after:?}")]
    Timeout { program: String, after: Duration },
    #[error("Malformed record for host '{host}': {reason}")]
    MalformedRecord { host: String, reason: String },
    #[error("Invalid transport configuration: {0}")]
    Configuration(String),
    #[error("Failed to load configuration file {path}: {reason}")]
    ConfigFile { path: String, reason: String },
    #[error("Failed to render records as JSON: {0}")]
    Render(#[from] serde_json::Error),
}

impl LavaError {
    /// Whether the error came from running the external process rather than from its output.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LavaError::Transport(_) | LavaError::Spawn { .. } | LavaError::Timeout { .. }
        )
    }

    pub(crate) fn malformed(host: &str, reason: impl Into<String>) -> Self {
        LavaError::MalformedRecord {
            host: host.to_string(),
            reason: reason.into(),
        }
    }
}
