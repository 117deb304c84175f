use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

/// Failure of a single external process invocation.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no executable named '{action}' found")]
    ExecutableNotFound { action: String },

    #[error("execution exceeded the {deadline:?} deadline")]
    Timeout { deadline: Duration, output: Vec<u8> },

    #[error("failed to run {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    /// Text to show the requester in place of (or alongside) process output.
    ///
    /// A missing executable yields a placeholder; a timeout yields whatever the
    /// process managed to emit before it was killed.
    pub fn output(&self) -> Vec<u8> {
        match self {
            RunError::ExecutableNotFound { action } => format!("No {action} found!").into_bytes(),
            RunError::Timeout { output, .. } => output.clone(),
            RunError::Spawn { path, source } => {
                format!("Failed to run {}: {source}", path.display()).into_bytes()
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RunError::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error("{identity} is not allowed to run privileged commands")]
    Denied { identity: String },

    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("image search failed: {0}")]
    Search(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the failure should stop the process. Only startup configuration
    /// problems qualify; everything else is scoped to one event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Config(_))
    }
}
