//! Result publication
//!
//! Downstream push is fire-and-forget: the orchestrator spawns the publish
//! and never awaits it on the evaluation path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arbiter_core::TxDecision;

/// Event published after each transaction evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationEvent {
    pub org_id: String,
    pub transaction_id: String,
    pub decision: TxDecision,
    pub triggered_rule_ids: Vec<String>,
    pub alert_ids: Vec<String>,
    pub partial: bool,
}

/// Publish capability for evaluation results.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event. Failures are the notifier's own concern; the
    /// evaluation path neither awaits nor inspects the delivery.
    async fn publish(&self, event: EvaluationEvent);
}

/// Drops every event (default wiring and tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, _event: EvaluationEvent) {}
}

/// Forwards events into an unbounded channel; the receiving half belongs to
/// the embedding process (push gateway, test assertion, ...).
pub struct ChannelNotifier {
    sender: tokio::sync::mpsc::UnboundedSender<EvaluationEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and its receiving half
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<EvaluationEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn publish(&self, event: EvaluationEvent) {
        // a closed receiver just means nobody is listening anymore
        let _ = self.sender.send(event);
    }
}
