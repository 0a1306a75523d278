//! NATS test infrastructure
//!
//! Provides a [`TestNats`] broker running in a container, with JetStream
//! enabled, for driving the listener crates against a real server.

use async_nats::Client;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

/// A throwaway JetStream-enabled NATS server.
///
/// The container is stopped and removed when the value is dropped. Tests
/// connect either through [`client`](Self::client) or by building their own
/// connection against [`url`](Self::url) (the listener crates resolve URLs
/// themselves, so most tests pass the URL through a `StreamSpec`).
///
/// # Example
///
/// ```no_run
/// use test_utils::TestNats;
///
/// # async fn example() {
/// let nats = TestNats::start().await;
/// let jetstream = nats.jetstream();
/// // create streams, publish, drain...
/// # }
/// ```
pub struct TestNats {
    #[allow(dead_code)]
    container: ContainerAsync<Nats>,
    client: Client,
    url: String,
}

impl TestNats {
    /// Start a fresh container with JetStream on (the `-js` flag).
    pub async fn start() -> Self {
        let image = Nats::default().with_tag("latest").with_cmd(["-js"]);

        let container = image.start().await.expect("start NATS container");
        let port = container
            .get_host_port_ipv4(4222)
            .await
            .expect("resolve NATS port");
        let url = format!("nats://127.0.0.1:{port}");

        let client = async_nats::connect(&url).await.expect("connect to NATS");

        tracing::info!(port, "test NATS ready with JetStream");
        Self {
            container,
            client,
            url,
        }
    }

    /// A cloned client connected to the container.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// A JetStream context over [`client`](Self::client).
    pub fn jetstream(&self) -> async_nats::jetstream::Context {
        async_nats::jetstream::new(self.client.clone())
    }

    /// Connection URL of the containerized server.
    pub fn url(&self) -> &str {
        &self.url
    }
}
