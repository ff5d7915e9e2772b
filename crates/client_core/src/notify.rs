use serde_json::Value;
use tracing::{error, info};

use crate::Notifier;

/// Notifier that reports through the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!(target: "notify", "{message}");
    }

    fn error(&self, scope: &str, payload: &Value, status: u16) {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string());
        error!(target: "notify", scope, status, "{message}");
    }
}
