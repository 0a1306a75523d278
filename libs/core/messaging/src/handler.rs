//! Handler trait for stream message processing.

use crate::error::HandlerError;
use crate::message::Message;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Callback invoked for each message pulled from a durable stream.
///
/// The handler is invoked strictly in pull order within a batch, and a
/// message is acknowledged only after `handle` returns `Ok` for it. A
/// returned error aborts the drain pass; the failing message and anything
/// buffered behind it are nak'd back to the broker.
///
/// Because redelivery is always possible, implementations must be
/// idempotent or otherwise tolerate seeing the same message twice.
///
/// # Example
///
/// ```rust,ignore
/// use messaging::{HandlerError, Message, MessageHandler};
/// use async_trait::async_trait;
///
/// struct OrderIndexer {
///     index: SearchIndex,
/// }
///
/// #[async_trait]
/// impl MessageHandler for OrderIndexer {
///     async fn handle(&self, message: Message) -> Result<(), HandlerError> {
///         let order: Order = serde_json::from_slice(&message.payload)
///             .map_err(|e| HandlerError::with_source("decode order", e))?;
///         self.index.upsert(order).await
///             .map_err(|e| HandlerError::with_source("index write", e))
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process a single message.
    async fn handle(&self, message: Message) -> Result<(), HandlerError>;
}

/// A handler that accepts every message (for testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

#[async_trait]
impl MessageHandler for NoopHandler {
    async fn handle(&self, _message: Message) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// A handler that succeeds `ok_before` times, then fails every call
/// (for testing abort semantics).
#[derive(Debug, Default)]
pub struct FailingHandler {
    ok_before: usize,
    calls: AtomicUsize,
}

impl FailingHandler {
    /// Fail starting with call number `ok_before + 1`.
    pub fn after(ok_before: usize) -> Self {
        Self {
            ok_before,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the handler has been called so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.ok_before {
            Ok(())
        } else {
            Err(HandlerError::new(format!(
                "rejected message at sequence {}",
                message.sequence
            )))
        }
    }
}

/// A handler that records the sequence of every message it accepts
/// (for asserting processing order in tests).
#[derive(Debug, Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<u64>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequences handled so far, in handling order.
    pub fn sequences(&self) -> Vec<u64> {
        self.seen.lock().expect("recording handler poisoned").clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        self.seen
            .lock()
            .expect("recording handler poisoned")
            .push(message.sequence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoopHandler;
        assert!(handler.handle(Message::new("t", "x", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_handler_fails_after_threshold() {
        let handler = FailingHandler::after(2);

        assert!(handler.handle(Message::new("t", "a", 1)).await.is_ok());
        assert!(handler.handle(Message::new("t", "b", 2)).await.is_ok());

        let err = handler.handle(Message::new("t", "c", 3)).await.unwrap_err();
        assert!(err.to_string().contains("sequence 3"));
        assert_eq!(handler.calls(), 3);
    }

    #[tokio::test]
    async fn test_recording_handler_keeps_order() {
        let handler = RecordingHandler::new();
        for seq in [3, 1, 2] {
            handler.handle(Message::new("t", "x", seq)).await.unwrap();
        }
        assert_eq!(handler.sequences(), vec![3, 1, 2]);
    }
}
