//! Shared setup for integration tests against a containerized broker.

use nats_listener::{Connector, Stream, StreamSpec};
use std::time::Duration;
use test_utils::TestNats;
use tokio_util::sync::CancellationToken;

/// Open a stream named `name` capturing `name.>` on the test broker.
pub async fn open_stream(nats: &TestNats, name: &str) -> (Connector, Stream) {
    let mut spec = StreamSpec::new(name, vec![format!("{name}.>")]);
    spec.nats_url = Some(nats.url().to_string());

    let connector = Connector::new();
    let stream = Stream::connect(spec, &connector)
        .await
        .expect("connect stream");
    (connector, stream)
}

/// Publish `count` messages on `subject`, sequences 1..=count.
pub async fn publish_n(stream: &Stream, subject: &str, count: usize) {
    for i in 0..count {
        stream
            .publish(subject, format!("payload-{i}").into())
            .await
            .expect("publish");
    }
}

/// A token that cancels itself after `timeout` — the test stand-in for a
/// platform-imposed deadline.
pub fn expiring(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let deadline = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        deadline.cancel();
    });
    token
}
