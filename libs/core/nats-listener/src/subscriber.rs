//! Push-style reply subscriber.
//!
//! The simpler consumption pattern: a plain (non-durable) subscription
//! where every inbound message synchronously triggers an invocation and,
//! when the message carries a reply subject, the target's output is
//! published back to it. No redelivery: a failed invocation is logged and
//! the message is gone.

use crate::connection::Connection;
use crate::error::ListenError;
use async_nats::Client;
use futures::StreamExt;
use messaging::InvokeTarget;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Subscribes to a subject and invokes a target per message, replying
/// with the target's output when asked to.
pub struct ReplySubscriber<T: InvokeTarget> {
    connection: Connection,
    subject: String,
    target: T,
}

impl<T: InvokeTarget> ReplySubscriber<T> {
    pub fn new(connection: Connection, subject: impl Into<String>, target: T) -> Self {
        Self {
            connection,
            subject: subject.into(),
            target,
        }
    }

    /// Process messages one at a time until `cancel` fires.
    ///
    /// On cancellation the subscription is torn down first — a failure to
    /// unsubscribe aborts the call — and every message already buffered
    /// locally is still processed before returning, so nothing delivered
    /// to this process is discarded.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), ListenError> {
        let client = self.connection.client().clone();
        let mut sub = client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "subscribed");

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    sub.unsubscribe()
                        .await
                        .map_err(|e| ListenError::Unsubscribe(e.to_string()))?;
                    break;
                }

                delivery = sub.next() => {
                    match delivery {
                        Some(message) => self.process(&client, message).await,
                        None => return Ok(()),
                    }
                }
            }
        }

        // finish whatever the broker already handed us
        let mut drained = 0usize;
        while let Some(message) = sub.next().await {
            self.process(&client, message).await;
            drained += 1;
        }
        if drained > 0 {
            debug!(subject = %self.subject, drained, "processed buffered messages after shutdown");
        }
        Ok(())
    }

    async fn process(&self, client: &Client, message: async_nats::Message) {
        match self.target.invoke(message.payload.clone()).await {
            Ok(output) => {
                if let Some(reply) = message.reply {
                    if let Err(error) = client.publish(reply, output).await {
                        warn!(subject = %self.subject, %error, "reply publish failed");
                    }
                }
            }
            // fire-and-forget pattern: one bad message must not stop the run
            Err(error) => {
                warn!(subject = %self.subject, %error, "invocation failed, message dropped");
            }
        }
    }
}
