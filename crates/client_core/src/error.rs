use serde_json::{json, Value};
use shared::{domain::TaskStatus, error::ApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server rejected request: {0}")]
    Api(#[from] ApiError),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("failed to decode server response: {0}")]
    Decode(String),
    /// The collaborator abandoned the operation on purpose; nothing to report.
    #[error("operation cancelled")]
    Cancelled,
    #[error("no case selected")]
    NoSelection,
    #[error("cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Status code to show next to the error; 0 when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            Self::Api(err) => err.status,
            _ => 0,
        }
    }

    /// Body to show to the user: the server's payload when there is one.
    pub fn payload(&self) -> Value {
        match self {
            Self::Api(err) => err.payload.clone(),
            other => json!({ "message": other.to_string() }),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
