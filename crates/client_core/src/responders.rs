use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::Responder,
    protocol::{ResponderAction, RunResponderRequest},
};
use tracing::debug;

use crate::{
    error::{ClientError, ClientResult},
    modal::{ConfirmDialog, ConfirmRequest, ModalOutcome},
    ResponderService,
};

/// Asks for confirmation before running a responder.
///
/// A dismissed dialog yields [`ClientError::Cancelled`], which callers treat
/// as a silent outcome.
pub struct ConfirmingResponderService {
    inner: Arc<dyn ResponderService>,
    dialog: Arc<dyn ConfirmDialog>,
}

impl ConfirmingResponderService {
    pub fn new(inner: Arc<dyn ResponderService>, dialog: Arc<dyn ConfirmDialog>) -> Self {
        Self { inner, dialog }
    }
}

#[async_trait]
impl ResponderService for ConfirmingResponderService {
    async fn list_responders(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> ClientResult<Vec<Responder>> {
        self.inner.list_responders(object_type, object_id).await
    }

    async fn run_responder(
        &self,
        request: &RunResponderRequest,
        responder_name: &str,
    ) -> ClientResult<ResponderAction> {
        let confirmation = ConfirmRequest::RunResponder {
            responder_name: responder_name.to_string(),
        };
        if let ModalOutcome::Dismissed = self.dialog.confirm(confirmation).await {
            debug!(responder = responder_name, "responder run dismissed");
            return Err(ClientError::Cancelled);
        }
        self.inner.run_responder(request, responder_name).await
    }
}
