//! Outstanding operations keyed by correlation id.

use std::collections::HashMap;

use pulse_common::CorrelationId;
use pulse_protocol::{MessageKind, StatusPayload};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::BridgeError;

pub type OperationResult = Result<StatusPayload, BridgeError>;

/// Where the outcome of an operation is delivered.
#[derive(Debug)]
pub enum Reply {
    /// A public API caller awaiting the result.
    Caller(oneshot::Sender<OperationResult>),
    /// A heartbeat ping issued by the controller itself.
    Heartbeat,
}

/// One command awaiting its acknowledgement.
#[derive(Debug)]
pub struct PendingOperation {
    pub kind: MessageKind,
    pub metadata: Value,
    reply: Reply,
    timer: Option<JoinHandle<()>>,
}

impl PendingOperation {
    pub fn new(kind: MessageKind, reply: Reply, metadata: Value) -> Self {
        Self {
            kind,
            metadata,
            reply,
            timer: None,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self.reply, Reply::Heartbeat)
    }

    pub fn arm(&mut self, timer: JoinHandle<()>) {
        if let Some(old) = self.timer.replace(timer) {
            old.abort();
        }
    }

    /// The survey id recorded for `present` operations.
    pub fn survey_id(&self) -> String {
        self.metadata
            .get("surveyId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Deliver the outcome. Consumes the operation, so it can settle only once.
    pub fn settle(mut self, result: OperationResult) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Reply::Caller(tx) = self.reply {
            // The caller may have stopped waiting.
            let _ = tx.send(result);
        }
    }
}

/// All operations that have not yet settled.
#[derive(Debug, Default)]
pub struct PendingTable {
    ops: HashMap<CorrelationId, PendingOperation>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: CorrelationId, op: PendingOperation) {
        if let Some(previous) = self.ops.insert(id, op) {
            previous.settle(Err(BridgeError::Cancelled));
        }
    }

    pub fn get_mut(&mut self, id: &CorrelationId) -> Option<&mut PendingOperation> {
        self.ops.get_mut(id)
    }

    pub fn remove(&mut self, id: &CorrelationId) -> Option<PendingOperation> {
        self.ops.remove(id)
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.ops.contains_key(id)
    }

    pub fn drain_all(&mut self) -> Vec<(CorrelationId, PendingOperation)> {
        self.ops.drain().collect()
    }
}

/// Single-occupancy slot for the one outstanding `present`.
#[derive(Debug, Default)]
pub struct PresentationSlot {
    occupant: Option<CorrelationId>,
}

impl PresentationSlot {
    /// Install `id`, returning the previous occupant.
    pub fn occupy(&mut self, id: CorrelationId) -> Option<CorrelationId> {
        self.occupant.replace(id)
    }

    /// Empty the slot if `id` is the occupant.
    pub fn release(&mut self, id: &CorrelationId) {
        if self.occupant.as_ref() == Some(id) {
            self.occupant = None;
        }
    }

    pub fn clear(&mut self) {
        self.occupant = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn caller(kind: MessageKind) -> (PendingOperation, oneshot::Receiver<OperationResult>) {
        let (tx, rx) = oneshot::channel();
        (PendingOperation::new(kind, Reply::Caller(tx), Value::Null), rx)
    }

    #[tokio::test]
    async fn settle_delivers_once() {
        let (op, rx) = caller(MessageKind::ApplyTheme);
        op.settle(Ok(StatusPayload::event("apply-theme-applied")));
        let status = rx.await.unwrap().unwrap();
        assert_eq!(status.event.as_deref(), Some("apply-theme-applied"));
    }

    #[tokio::test]
    async fn settle_aborts_timer() {
        let (mut op, _rx) = caller(MessageKind::Dismiss);
        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        op.arm(tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await
        }));
        op.settle(Err(BridgeError::Destroyed));
        assert!(alive_rx.await.is_err());
    }

    #[tokio::test]
    async fn reused_id_cancels_the_previous_operation() {
        let mut table = PendingTable::new();
        let (first, first_rx) = caller(MessageKind::Present);
        let (second, _second_rx) = caller(MessageKind::Present);
        table.insert(CorrelationId::from("a"), first);
        table.insert(CorrelationId::from("a"), second);

        assert!(matches!(first_rx.await.unwrap(), Err(BridgeError::Cancelled)));
        assert!(table.contains(&CorrelationId::from("a")));
        assert_eq!(table.drain_all().len(), 1);
    }

    #[test]
    fn heartbeat_reply_settles_silently() {
        let op = PendingOperation::new(MessageKind::Ping, Reply::Heartbeat, Value::Null);
        assert!(op.is_heartbeat());
        op.settle(Ok(StatusPayload::default()));
    }

    #[test]
    fn survey_id_from_metadata() {
        let (tx, _rx) = oneshot::channel();
        let op = PendingOperation::new(
            MessageKind::Present,
            Reply::Caller(tx),
            json!({ "surveyId": "1234" }),
        );
        assert_eq!(op.survey_id(), "1234");
    }

    #[test]
    fn slot_release_only_matches_occupant() {
        let mut slot = PresentationSlot::default();
        assert!(slot.occupy(CorrelationId::from("a")).is_none());
        let prev = slot.occupy(CorrelationId::from("b"));
        assert_eq!(prev.unwrap().as_str(), "a");

        slot.release(&CorrelationId::from("a"));
        let prev = slot.occupy(CorrelationId::from("c"));
        assert_eq!(prev.unwrap().as_str(), "b");
        slot.release(&CorrelationId::from("c"));
        assert!(slot.occupy(CorrelationId::from("d")).is_none());
    }
}
