//! Reply-subscriber behavior: synchronous replies and graceful shutdown.

use async_trait::async_trait;
use bytes::Bytes;
use messaging::{EchoTarget, InvokeError, InvokeTarget};
use nats_listener::{Connection, ReplySubscriber};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_utils::TestNats;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

fn connection(nats: &TestNats) -> Connection {
    let (_tx, rx) = watch::channel(0u64);
    Connection::new(nats.client(), rx, nats.url())
}

#[tokio::test]
async fn test_reply_subscriber_answers_requests() {
    let nats = TestNats::start().await;
    let subscriber = ReplySubscriber::new(connection(&nats), "rpc.echo", EchoTarget);

    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { subscriber.run(&cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = nats.client();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        client.request("rpc.echo", "ping".into()),
    )
    .await
    .expect("request timed out")
    .unwrap();
    assert_eq!(response.payload.as_ref(), b"ping");

    cancel.cancel();
    run.await.unwrap().unwrap();
}

/// Target slow enough that shutdown always finds buffered messages.
struct SlowTarget {
    handled: Arc<AtomicUsize>,
}

#[async_trait]
impl InvokeTarget for SlowTarget {
    async fn invoke(&self, _payload: Bytes) -> Result<Bytes, InvokeError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::new())
    }
}

#[tokio::test]
async fn test_shutdown_processes_buffered_messages() {
    let nats = TestNats::start().await;
    let handled = Arc::new(AtomicUsize::new(0));
    let subscriber = ReplySubscriber::new(
        connection(&nats),
        "jobs.slow",
        SlowTarget {
            handled: handled.clone(),
        },
    );

    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { subscriber.run(&cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = nats.client();
    for i in 0..5 {
        client
            .publish("jobs.slow", format!("job-{i}").into())
            .await
            .unwrap();
    }
    client.flush().await.unwrap();

    // cancel mid-processing: everything already delivered locally must
    // still be handled before run returns
    tokio::time::sleep(Duration::from_millis(120)).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(handled.load(Ordering::SeqCst), 5);
}
