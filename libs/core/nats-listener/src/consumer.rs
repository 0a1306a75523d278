//! Durable pull consumer: peek (`wait`) and drain (`consume`).
//!
//! Both operations speak the JetStream pull-consumer wire protocol
//! directly: a pull request is published to the consumer's `MSG.NEXT` API
//! subject with an ephemeral inbox as the reply address, and deliveries
//! arrive on that inbox. Broker flow-control rides on the `Status` header
//! of otherwise-empty deliveries rather than in payloads.

use crate::config::ConsumerSpec;
use crate::connection::Connection;
use crate::error::ListenError;
use async_nats::header::HeaderMap;
use async_nats::{Client, Subscriber};
use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use messaging::{Message, MessageHandler};
use serde::Serialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pull batch size bounding the number of in-flight deliveries per request.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

// Pull-consumer status signals, carried in the Status header of
// empty-payload deliveries.
const STATUS_CONTROL: u16 = 100;
const STATUS_NO_MESSAGES: u16 = 404;
const STATUS_REQUEST_TIMEOUT: u16 = 408;
const STATUS_NO_RESPONDERS: u16 = 503;

const JS_API_PREFIX: &str = "$JS.API";
const ACK: Bytes = Bytes::from_static(b"+ACK");
const NAK: Bytes = Bytes::from_static(b"-NAK");

/// Body of a `MSG.NEXT` pull request.
#[derive(Debug, Serialize)]
struct NextRequest {
    batch: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_wait: Option<bool>,
}

/// A named durable cursor over a stream.
///
/// Created per invocation via [`Stream::consumer`](crate::Stream::consumer);
/// holds no state the broker does not also hold, so dropping it loses
/// nothing.
#[derive(Debug)]
pub struct Consumer {
    spec: ConsumerSpec,
    connection: Connection,
    next_subject: String,
    batch_size: usize,
}

impl Consumer {
    pub(crate) fn new(stream_name: String, spec: ConsumerSpec, connection: Connection) -> Self {
        let next_subject = format!(
            "{}.CONSUMER.MSG.NEXT.{}.{}",
            JS_API_PREFIX, stream_name, spec.name
        );
        Self {
            spec,
            connection,
            next_subject,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the pull batch size (in-flight bound) for [`consume`](Self::consume).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The spec this consumer was created from.
    pub fn spec(&self) -> &ConsumerSpec {
        &self.spec
    }

    /// Wait for one new message past the cursor and report its stream
    /// sequence without consuming it.
    ///
    /// The message is immediately nak'd back to the broker: `wait` only
    /// detects presence. Returns `Ok(None)` when `cancel` fires before a
    /// message shows up (real sequences start at 1). A broker reconnect
    /// silently restarts the blocking pull; it is never surfaced as an
    /// error.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<Option<u64>, ListenError> {
        let client = self.connection.client().clone();
        let inbox = client.new_inbox();
        let mut sub = client.subscribe(inbox.clone()).await?;

        let result = self.wait_inner(&client, cancel, &inbox, &mut sub).await;
        let _ = sub.unsubscribe().await;
        result
    }

    async fn wait_inner(
        &self,
        client: &Client,
        cancel: &CancellationToken,
        inbox: &str,
        sub: &mut Subscriber,
    ) -> Result<Option<u64>, ListenError> {
        let mut reconnects = self.connection.reconnects();
        self.request_next(client, inbox, 1, false).await?;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return Ok(None),

                changed = reconnects.changed() => {
                    if changed.is_err() {
                        return Err(ListenError::ConnectionClosed);
                    }
                    // server-side pull state died with the old connection
                    debug!(consumer = %self.spec.name, "reconnected, restarting pull");
                    self.request_next(client, inbox, 1, false).await?;
                }

                delivery = sub.next() => {
                    let Some(delivery) = delivery else {
                        return Err(ListenError::ConnectionClosed);
                    };

                    if let Some(status) = delivery.status {
                        match status.as_u16() {
                            STATUS_CONTROL => respond_control(client, &delivery).await,
                            STATUS_NO_MESSAGES | STATUS_REQUEST_TIMEOUT => {
                                self.request_next(client, inbox, 1, false).await?;
                            }
                            STATUS_NO_RESPONDERS => return Err(ListenError::NoResponders),
                            code => {
                                return Err(ListenError::FlowControl {
                                    status: code,
                                    description: delivery.description.unwrap_or_default(),
                                })
                            }
                        }
                        continue;
                    }

                    let Some(reply) = delivery.reply else {
                        return Err(ListenError::InvalidAckSubject(delivery.subject.to_string()));
                    };
                    let sequence = stream_sequence(reply.as_str())?;

                    // peek only: hand the message straight back
                    client.publish(reply, NAK).await?;
                    return Ok(Some(sequence));
                }
            }
        }
    }

    /// Drain every currently retained, unacknowledged message, invoking
    /// `handler` for each in pull order.
    ///
    /// Messages are pulled in batches of `batch_size` and acked one by one
    /// strictly after the handler accepts them. A handler error naks the
    /// failing message and everything still buffered, then propagates.
    /// Cancellation naks buffered messages and returns `Ok(())` — a
    /// cooperative shutdown, not a failure. `Ok(())` always means every
    /// message handed to the handler before return was acked.
    pub async fn consume<H>(
        &self,
        cancel: &CancellationToken,
        handler: &H,
    ) -> Result<(), ListenError>
    where
        H: MessageHandler,
    {
        let client = self.connection.client().clone();
        let inbox = client.new_inbox();
        let mut sub = client.subscribe(inbox.clone()).await?;

        let result = self
            .consume_inner(&client, cancel, handler, &inbox, &mut sub)
            .await;
        let _ = sub.unsubscribe().await;
        result
    }

    async fn consume_inner<H>(
        &self,
        client: &Client,
        cancel: &CancellationToken,
        handler: &H,
        inbox: &str,
        sub: &mut Subscriber,
    ) -> Result<(), ListenError>
    where
        H: MessageHandler,
    {
        loop {
            // next batch; no_wait so an empty consumer terminates instead
            // of blocking
            self.request_next(client, inbox, self.batch_size, true).await?;
            let mut acked = 0usize;

            while acked < self.batch_size {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        drain_and_nak(client, sub).await;
                        return Ok(());
                    }

                    delivery = sub.next() => {
                        let Some(delivery) = delivery else {
                            return Err(ListenError::ConnectionClosed);
                        };

                        if let Some(status) = delivery.status {
                            match status.as_u16() {
                                STATUS_NO_MESSAGES => return Ok(()),
                                STATUS_CONTROL => {
                                    respond_control(client, &delivery).await;
                                    continue;
                                }
                                code => {
                                    return Err(ListenError::FlowControl {
                                        status: code,
                                        description: delivery.description.unwrap_or_default(),
                                    });
                                }
                            }
                        }

                        let Some(reply) = delivery.reply.clone() else {
                            return Err(ListenError::InvalidAckSubject(delivery.subject.to_string()));
                        };
                        let sequence = stream_sequence(reply.as_str())?;

                        let message = Message {
                            subject: delivery.subject.to_string(),
                            headers: header_map(delivery.headers.as_ref()),
                            payload: delivery.payload.clone(),
                            sequence,
                        };

                        match handler.handle(message).await {
                            Ok(()) => {
                                client.publish(reply, ACK).await?;
                                acked += 1;
                            }
                            Err(error) => {
                                warn!(
                                    consumer = %self.spec.name,
                                    sequence,
                                    %error,
                                    "handler failed, returning batch to broker"
                                );
                                if let Err(nak_error) = client.publish(reply, NAK).await {
                                    warn!(%nak_error, "nak of failed message did not go out");
                                }
                                drain_and_nak(client, sub).await;
                                return Err(ListenError::Handler(error));
                            }
                        }
                    }
                }
            }

            debug!(consumer = %self.spec.name, batch = acked, "batch drained");
        }
    }

    async fn request_next(
        &self,
        client: &Client,
        inbox: &str,
        batch: usize,
        no_wait: bool,
    ) -> Result<(), ListenError> {
        let request = NextRequest {
            batch,
            no_wait: no_wait.then_some(true),
        };
        let payload = serde_json::to_vec(&request)?;
        client
            .publish_with_reply(self.next_subject.clone(), inbox.to_string(), payload.into())
            .await?;
        Ok(())
    }
}

/// Answer a control/heartbeat delivery so the broker keeps the pull alive.
async fn respond_control(client: &Client, delivery: &async_nats::Message) {
    if let Some(reply) = delivery.reply.clone() {
        if let Err(error) = client.publish(reply, Bytes::new()).await {
            warn!(%error, "control response did not go out");
        }
    }
}

/// Nak everything still buffered locally so no delivery is left
/// ambiguously in flight. Only already-delivered messages are touched;
/// this never blocks waiting for more.
async fn drain_and_nak(client: &Client, sub: &mut Subscriber) {
    while let Some(Some(delivery)) = sub.next().now_or_never() {
        if delivery.status.is_some() {
            continue;
        }
        if let Some(reply) = delivery.reply {
            if let Err(error) = client.publish(reply, NAK).await {
                warn!(%error, "nak did not go out during drain");
            }
        }
    }
}

/// Extract the stream sequence from a JetStream ack subject.
///
/// `$JS.ACK.<stream>.<consumer>.<delivered>.<stream seq>.<consumer seq>.<timestamp>.<pending>`
/// for the original form; newer servers insert `<domain>.<account hash>`
/// after the `ACK` token.
fn stream_sequence(reply: &str) -> Result<u64, ListenError> {
    let tokens: Vec<&str> = reply.split('.').collect();
    let raw = match tokens.as_slice() {
        ["$JS", "ACK", _, _, _, seq, _, _, _] => seq,
        ["$JS", "ACK", _, _, _, _, _, seq, _, _, _, ..] => seq,
        _ => return Err(ListenError::InvalidAckSubject(reply.to_string())),
    };
    raw.parse()
        .map_err(|_| ListenError::InvalidAckSubject(reply.to_string()))
}

fn header_map(headers: Option<&HeaderMap>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(headers) = headers {
        for (name, values) in headers.iter() {
            if let Some(value) = values.first() {
                map.insert(name.to_string(), value.to_string());
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_sequence_v1() {
        let seq = stream_sequence("$JS.ACK.ORDERS.indexer.1.42.17.1700000000.5").unwrap();
        assert_eq!(seq, 42);
    }

    #[test]
    fn test_stream_sequence_v2_with_domain() {
        let seq =
            stream_sequence("$JS.ACK.hub.acchash.ORDERS.indexer.1.42.17.1700000000.5.token")
                .unwrap();
        assert_eq!(seq, 42);
    }

    #[test]
    fn test_stream_sequence_rejects_foreign_subjects() {
        assert!(stream_sequence("orders.created").is_err());
        assert!(stream_sequence("$JS.ACK.too.short").is_err());
        assert!(stream_sequence("$JS.ACK.S.C.x.not-a-number.1.2.3").is_err());
    }

    #[test]
    fn test_next_request_wire_shape() {
        let blocking = serde_json::to_value(NextRequest {
            batch: 1,
            no_wait: None,
        })
        .unwrap();
        assert_eq!(blocking, serde_json::json!({ "batch": 1 }));

        let drain = serde_json::to_value(NextRequest {
            batch: 256,
            no_wait: Some(true),
        })
        .unwrap();
        assert_eq!(drain, serde_json::json!({ "batch": 256, "no_wait": true }));
    }
}
