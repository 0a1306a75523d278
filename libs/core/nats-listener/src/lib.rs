//! Durable stream consumption for short-lived compute, on NATS JetStream.
//!
//! A process that is invoked, does work, and exits cannot hold the
//! long-poll pull a JetStream consumer naturally wants. This crate bridges
//! the two idioms with at-least-once semantics: acknowledge on success,
//! negative-acknowledge on failure or abort, bounded in-flight batches,
//! and reconnect-safe cancellation.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   wait (peek)   ┌────────────┐   invoke    ┌─────────────┐
//! │  Stream   │◀───────────────│  PollLoop   │────────────▶│ InvokeTarget │
//! │ (durable) │                 └────────────┘             │  (compute)   │
//! │           │   consume (drain, ack/nak)                 └──────┬──────┘
//! │           │◀──────────────────────────────────────────────────┘
//! └───────────┘        consume_with_deadline(spec, handler)
//! ```
//!
//! Two consumption patterns sit on the pull consumer:
//!
//! - [`PollLoop`]: each time [`Consumer::wait`] observes new work, invoke a
//!   downstream target with the serialized [`ConsumerSpec`]; the target
//!   reconnects and drains via [`consume_with_deadline`], then the loop
//!   waits again.
//! - [`ReplySubscriber`]: a plain subscription that invokes the target per
//!   message and publishes the output to the message's reply subject.
//!
//! # Example
//!
//! ```rust,ignore
//! use nats_listener::{Connector, ConsumerSpec, PollLoop, Stream, StreamSpec};
//! use nats_listener::HttpInvoker;
//! use tokio_util::sync::CancellationToken;
//!
//! let connector = Connector::new();
//! let spec = StreamSpec::new("orders", vec!["orders.>".into()]);
//! let stream = Stream::connect(spec.clone(), &connector).await?;
//!
//! let consumer = ConsumerSpec::new(spec, "indexer", "http://indexer.internal/run");
//! let target = HttpInvoker::new(consumer.handler.clone());
//! let poll = PollLoop::new(&stream, consumer, target, Some("172.31.0.9")).await?;
//! poll.run(&CancellationToken::new()).await?;
//! ```

mod config;
mod connection;
mod consumer;
mod error;
mod handler;
mod invoke;
mod poll;
mod stream;
mod subscriber;

pub use config::{ConsumerSpec, StreamSpec, DEFAULT_NATS_URL, ENV_NATS_URL};
pub use connection::{Connection, Connector};
pub use consumer::{Consumer, DEFAULT_BATCH_SIZE};
pub use error::ListenError;
pub use handler::{consume_with_deadline, CLEANUP_MARGIN};
pub use invoke::HttpInvoker;
pub use poll::PollLoop;
pub use stream::Stream;
pub use subscriber::ReplySubscriber;

// Re-export from messaging
pub use messaging::{HandlerError, InvokeError, InvokeTarget, Message, MessageHandler};
