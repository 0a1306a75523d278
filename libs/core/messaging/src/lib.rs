//! Common messaging abstractions for durable stream consumption.
//!
//! This crate defines the backend-agnostic pieces shared by stream
//! consumers: the [`Message`] shape delivered from a stream, the
//! [`MessageHandler`] callback invoked per message, and the
//! [`InvokeTarget`] trait for handing work to external compute (an HTTP
//! endpoint, a platform function, a test double).
//!
//! The NATS JetStream implementation lives in the `nats-listener` crate.

mod error;
mod handler;
mod invoke;
mod message;

pub use error::{HandlerError, InvokeError};
pub use handler::{FailingHandler, MessageHandler, NoopHandler, RecordingHandler};
pub use invoke::{CountingTarget, EchoTarget, InvokeTarget};
pub use message::Message;
