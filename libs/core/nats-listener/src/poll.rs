//! Poll-and-invoke loop.
//!
//! Models a consumer that cannot stay alive: whenever [`Consumer::wait`]
//! reports new work, a downstream compute target is invoked with the
//! serialized [`ConsumerSpec`] so it can connect independently and drain
//! the backlog, then the loop waits again.

use crate::config::ConsumerSpec;
use crate::consumer::Consumer;
use crate::error::ListenError;
use crate::stream::Stream;
use bytes::Bytes;
use messaging::InvokeTarget;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A self-re-triggering consumption loop over a durable consumer.
pub struct PollLoop<T: InvokeTarget> {
    consumer: Consumer,
    target: T,
    payload: Bytes,
}

impl<T: InvokeTarget> PollLoop<T> {
    /// Set up the loop: create the durable consumer and precompute the
    /// invocation payload.
    ///
    /// The payload is the spec with its broker URL rewritten to the live
    /// connection's server list; `advertise_ip` replaces loopback hosts so
    /// a target running on other infrastructure can reach the broker.
    pub async fn new(
        stream: &Stream,
        spec: ConsumerSpec,
        target: T,
        advertise_ip: Option<&str>,
    ) -> Result<Self, ListenError> {
        let consumer = stream.consumer(spec.clone()).await?;

        let mut handoff = spec;
        handoff.stream.nats_url = Some(handoff_url(&stream.servers(), advertise_ip));
        let payload = Bytes::from(serde_json::to_vec(&handoff)?);

        Ok(Self {
            consumer,
            target,
            payload,
        })
    }

    /// Run until `cancel` fires (clean exit) or an error occurs.
    ///
    /// The handler invoked between two waits is expected to make progress.
    /// Observing the same sequence twice in a row means it ran but nothing
    /// changed, which would spin forever; that is surfaced as
    /// [`ListenError::Stalled`] rather than retried.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), ListenError> {
        let spec = self.consumer.spec();
        info!(consumer = %spec.name, handler = %spec.handler, "poll loop started");

        let mut last_sequence = 0u64;
        loop {
            let Some(sequence) = self.consumer.wait(cancel).await? else {
                info!(consumer = %spec.name, "poll loop finished");
                return Ok(());
            };

            if last_sequence != 0 && sequence == last_sequence {
                return Err(ListenError::Stalled { sequence });
            }

            debug!(consumer = %spec.name, sequence, "new work, invoking handler");
            self.target.invoke(self.payload.clone()).await?;
            last_sequence = sequence;
        }
    }
}

/// Join broker addresses for handoff, substituting loopback hosts with the
/// advertise address when one is configured.
fn handoff_url(servers: &[String], advertise_ip: Option<&str>) -> String {
    let joined = servers.join(",");
    match advertise_ip {
        Some(ip) => joined.replace("127.0.0.1", ip).replace("localhost", ip),
        None => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_url_rewrites_loopback() {
        let servers = vec![
            "127.0.0.1:4222".to_string(),
            "nats://localhost:4223".to_string(),
            "10.1.2.3:4222".to_string(),
        ];
        assert_eq!(
            handoff_url(&servers, Some("172.31.0.9")),
            "172.31.0.9:4222,nats://172.31.0.9:4223,10.1.2.3:4222"
        );
    }

    #[test]
    fn test_handoff_url_without_advertise_ip() {
        let servers = vec!["127.0.0.1:4222".to_string()];
        assert_eq!(handoff_url(&servers, None), "127.0.0.1:4222");
    }
}
