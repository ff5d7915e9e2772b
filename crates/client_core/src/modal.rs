//! Modal results and the confirmation dialog seam.

use async_trait::async_trait;

/// How a modal flow ended: closed with a result, or dismissed without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalOutcome<T> {
    Closed(T),
    Dismissed,
}

impl<T> ModalOutcome<T> {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Closed(value) => Some(value),
            Self::Dismissed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    RemoveTask { title: String },
    RunResponder { responder_name: String },
}

impl ConfirmRequest {
    pub fn prompt(&self) -> String {
        match self {
            Self::RemoveTask { title } => {
                format!("Are you sure you want to delete the task \"{title}\"?")
            }
            Self::RunResponder { responder_name } => {
                format!("Are you sure you want to run responder {responder_name}?")
            }
        }
    }
}

#[async_trait]
pub trait ConfirmDialog: Send + Sync {
    async fn confirm(&self, request: ConfirmRequest) -> ModalOutcome<()>;
}

/// Dialog that answers every request the same way, for non-interactive hosts.
pub struct FixedAnswer(pub bool);

#[async_trait]
impl ConfirmDialog for FixedAnswer {
    async fn confirm(&self, _request: ConfirmRequest) -> ModalOutcome<()> {
        if self.0 {
            ModalOutcome::Closed(())
        } else {
            ModalOutcome::Dismissed
        }
    }
}
