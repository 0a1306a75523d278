//! Deadline-trimmed drain entrypoint for platform-invoked handlers.
//!
//! The downstream half of the poll-loop handoff: a platform function
//! deserializes the [`ConsumerSpec`] it was invoked with and calls
//! [`consume_with_deadline`] so the drain stops slightly before the
//! platform kills the process, leaving time to flush acks.

use crate::config::ConsumerSpec;
use crate::connection::Connector;
use crate::error::ListenError;
use crate::stream::Stream;
use messaging::MessageHandler;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Shaved off the platform deadline so in-flight acks can be flushed
/// before forced termination.
pub const CLEANUP_MARGIN: Duration = Duration::from_millis(10);

/// Connect per the spec and drain the consumer until `deadline` minus
/// [`CLEANUP_MARGIN`].
///
/// Hitting the trimmed deadline is a cooperative stop, not an error:
/// everything acked so far stays acked, everything else is nak'd and
/// redelivered to the next invocation.
pub async fn consume_with_deadline<H>(
    connector: &Connector,
    spec: ConsumerSpec,
    handler: &H,
    deadline: Instant,
) -> Result<(), ListenError>
where
    H: MessageHandler,
{
    let stream = Stream::connect(spec.stream.clone(), connector).await?;
    let consumer = stream.consumer(spec).await?;

    let trimmed = deadline.checked_sub(CLEANUP_MARGIN).unwrap_or(deadline);
    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    let guard = tokio::spawn(async move {
        tokio::time::sleep_until(trimmed).await;
        timer.cancel();
    });

    let result = consumer.consume(&cancel, handler).await;
    guard.abort();

    if let Err(error) = stream.connection().client().flush().await {
        warn!(%error, "flush after drain failed");
    }
    result
}
