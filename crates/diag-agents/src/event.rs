//! Progress/event emission from the agent pipelines.
//!
//! Each task emits ordered progress notifications and exactly one final
//! event carrying either the synthesized report or an error description.
//! Emission is synchronous with the loop: a phase's events are delivered
//! before the next phase begins.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Sink for task progress and the final result.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit a progress notification (`is_final = false`) or the terminal
    /// result (`is_final = true`). Exactly one final emission per task.
    async fn emit(&self, message: &str, is_final: bool);
}

/// Pass-through sink that only logs.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl EventSink for LoggingSink {
    async fn emit(&self, message: &str, is_final: bool) {
        let status = if is_final { "final" } else { "update" };
        info!(status, "{message}");
    }
}

/// One update flowing through a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub message: String,
    pub is_final: bool,
}

/// Streaming bridge that forwards updates to an external task-update consumer.
///
/// Uses an unbounded channel so the loop never blocks on a slow consumer;
/// updates still arrive in emission order.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TaskUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, message: &str, is_final: bool) {
        let update = TaskUpdate {
            message: message.to_string(),
            is_final,
        };
        if self.tx.send(update).is_err() {
            warn!("task update receiver dropped; discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_preserves_order_and_final_flag() {
        let (sink, mut rx) = ChannelSink::new();

        sink.emit("Creating a plan...", false).await;
        sink.emit("Executing step: list pods", false).await;
        sink.emit("the report", true).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.message, "Creating a plan...");
        assert!(!first.is_final);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.message, "Executing step: list pods");

        let last = rx.recv().await.unwrap();
        assert!(last.is_final);
        assert_eq!(last.message, "the report");
    }

    #[tokio::test]
    async fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        // Must not panic or error the task.
        sink.emit("update after close", false).await;
    }
}
