//! Invocation target trait for handing work to external compute.

use crate::error::InvokeError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A downstream compute target that can be invoked with an opaque payload.
///
/// The poll loop invokes the target every time new work is observed on a
/// stream, passing the serialized consumer spec so the target can connect
/// and drain independently. The reply subscriber invokes the target once
/// per inbound message and publishes the returned bytes to the message's
/// reply subject when one is present.
#[async_trait]
pub trait InvokeTarget: Send + Sync {
    /// Invoke the target and return its response payload.
    async fn invoke(&self, payload: Bytes) -> Result<Bytes, InvokeError>;
}

#[async_trait]
impl<T: InvokeTarget + ?Sized> InvokeTarget for std::sync::Arc<T> {
    async fn invoke(&self, payload: Bytes) -> Result<Bytes, InvokeError> {
        (**self).invoke(payload).await
    }
}

/// A target that accepts every invocation and returns nothing
/// (for testing).
#[derive(Debug, Default)]
pub struct CountingTarget {
    calls: AtomicUsize,
}

impl CountingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InvokeTarget for CountingTarget {
    async fn invoke(&self, _payload: Bytes) -> Result<Bytes, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::new())
    }
}

/// A target that echoes the invocation payload back (for testing replies).
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTarget;

#[async_trait]
impl InvokeTarget for EchoTarget {
    async fn invoke(&self, payload: Bytes) -> Result<Bytes, InvokeError> {
        Ok(payload)
    }
}
