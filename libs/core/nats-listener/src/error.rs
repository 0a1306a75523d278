//! Error types for the NATS listener.

use messaging::{HandlerError, InvokeError};
use thiserror::Error;

/// Error that can occur while consuming a durable stream.
#[derive(Debug, Error)]
pub enum ListenError {
    /// Broker unreachable or authentication failed at connect time.
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: async_nats::ConnectError,
    },

    /// Stream load-or-create failed for a reason other than existence.
    #[error("create stream '{name}' failed: {source}")]
    CreateStream {
        name: String,
        #[source]
        source: async_nats::jetstream::context::CreateStreamError,
    },

    /// Consumer load-or-create failed.
    #[error("create consumer '{name}' failed: {source}")]
    CreateConsumer {
        name: String,
        #[source]
        source: async_nats::jetstream::stream::ConsumerError,
    },

    /// Subscribing an inbox or subject failed.
    #[error("subscribe failed: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// Unsubscribing during shutdown failed.
    #[error("unsubscribe failed: {0}")]
    Unsubscribe(String),

    /// A core publish (pull request, ack, reply) failed.
    #[error("publish failed: {0}")]
    Publish(#[from] async_nats::PublishError),

    /// A JetStream publish did not get a positive ack.
    #[error("stream publish failed: {0}")]
    StreamPublish(#[from] async_nats::jetstream::context::PublishError),

    /// The broker answered a pull request with an unrecognized status.
    #[error("pull request failed with status {status}: {description}")]
    FlowControl { status: u16, description: String },

    /// Nothing answered the pull request; JetStream is unavailable or the
    /// consumer is gone.
    #[error("no responders for pull request")]
    NoResponders,

    /// The connection closed underneath a blocking wait.
    #[error("connection closed while waiting for deliveries")]
    ConnectionClosed,

    /// A delivery carried an ack subject this client cannot interpret.
    #[error("invalid ack subject '{0}'")]
    InvalidAckSubject(String),

    /// The message callback failed; the batch was nak'd back to the broker.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Invoking the downstream compute target failed.
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// The handler was invoked but the next observed sequence did not
    /// change — the consumer is not making progress.
    #[error("handler invoked but sequence is still {sequence}; consumer is not making progress")]
    Stalled { sequence: u64 },

    /// Spec (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ListenError {
    /// Whether this error is the poll loop's progress-stall guard, as
    /// opposed to an I/O failure. Operators use this to tell "handler is
    /// stuck" apart from "broker is down".
    pub fn is_stall(&self) -> bool {
        matches!(self, ListenError::Stalled { .. })
    }
}
