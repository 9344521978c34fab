use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::metrics::Metrics;
use crate::protocol::MessagePayload;
use crate::transport::{send_message, DeleteOutcome, InteractionCtx, MessageHandle, Transport, TransportError};

type Slot = Arc<Mutex<Option<MessageHandle>>>;

/// Keeps at most one live private reply per user: each new reply deletes
/// the previous one first.
pub struct EphemeralSessionTracker {
    transport: Arc<dyn Transport>,
    metrics: Arc<Metrics>,
    sessions: DashMap<String, Slot>,
}

impl EphemeralSessionTracker {
    pub fn new(transport: Arc<dyn Transport>, metrics: Arc<Metrics>) -> Self {
        Self {
            transport,
            metrics,
            sessions: DashMap::new(),
        }
    }

    fn slot(&self, user_id: &str) -> Slot {
        self.sessions
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Replaces the user's tracked private reply with `payload`.
    ///
    /// The per-user slot stays locked across delete and send, so two replies
    /// racing for the same user run one after the other.
    pub async fn send_private(
        &self,
        ctx: &InteractionCtx,
        payload: MessagePayload,
    ) -> Result<MessageHandle, TransportError> {
        let slot = self.slot(&ctx.user_id);
        let mut last = slot.lock().await;

        if let Some(previous) = last.take() {
            match self.transport.delete_message(&previous).await {
                DeleteOutcome::Deleted => {}
                DeleteOutcome::NotFound => {
                    debug!("Previous private reply for {} already gone", ctx.user_id);
                }
                DeleteOutcome::Denied => {
                    self.metrics.inc_failed_deletes();
                    warn!("Missing permission to delete private reply for user {}", ctx.user_id);
                }
                DeleteOutcome::Failed(reason) => {
                    self.metrics.inc_failed_deletes();
                    warn!("Deleting private reply for user {} failed: {}", ctx.user_id, reason);
                }
            }
        }

        let handle = send_message(self.transport.as_ref(), ctx, payload.ephemeral()).await?;
        self.metrics.inc_private_replies();
        *last = Some(handle.clone());
        Ok(handle)
    }

    #[cfg(test)]
    pub async fn last_reply(&self, user_id: &str) -> Option<MessageHandle> {
        let slot = self.sessions.get(user_id)?.value().clone();
        let handle = slot.lock().await.clone();
        handle
    }

    pub fn tracked_users(&self) -> usize {
        self.sessions.len()
    }
}
