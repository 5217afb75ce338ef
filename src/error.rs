use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::workflow::WorkflowKind;

/// Failure to obtain the current time from the remote clock.
#[derive(Error, Debug)]
pub enum TimeError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed time payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("unparsable datetime: {0}")]
    Datetime(#[from] chrono::ParseError),
}

/// Failure to run an external process to completion.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("external process did not finish within {}s", .0.as_secs_f64())]
    TimedOut(Duration),
}

/// Every way a workflow trigger can end without a download.
///
/// The `Display` text is what the user sees.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{}", .0.missing_input_message())]
    MissingInput(WorkflowKind),

    #[error("Invalid upload file name: {0:?}")]
    InvalidFileName(String),

    #[error("Failed to store {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error during {}: {}", .kind.activity(), .source)]
    Invoke {
        kind: WorkflowKind,
        #[source]
        source: InvokeError,
    },

    #[error("Error during {}: {}", .kind.activity(), .stderr)]
    ProcessFailed {
        kind: WorkflowKind,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{}", .0.generation_error_message())]
    MissingArtifact(WorkflowKind),
}

impl WorkflowError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WorkflowError::Storage {
            path: path.into(),
            source,
        }
    }
}
