//! Broker connection provider.
//!
//! A [`Connector`] is constructed once by the host application and shared;
//! it hands out one [`Connection`] per broker URL so every stream and
//! consumer in the process reuses the same underlying client. Each
//! connection exposes its reconnect history as a watch channel carrying a
//! generation counter; blocking waits race against it so they can restart
//! transparently when the broker connection is re-established.

use crate::config::StreamSpec;
use crate::error::ListenError;
use async_nats::{Client, ConnectOptions, Event};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// Bound on locally buffered deliveries per subscription, sized to avoid
/// broker-side slow-consumer disconnects.
const SUBSCRIPTION_CAPACITY: usize = 1024;

/// Hands out shared broker connections keyed by URL.
#[derive(Debug, Default)]
pub struct Connector {
    connections: Mutex<HashMap<String, Connection>>,
}

impl Connector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `url`, reusing an existing connection to the same URL.
    ///
    /// Connect failures are fatal and returned as-is; this library never
    /// retries the initial connect.
    pub async fn connect(&self, url: &str) -> Result<Connection, ListenError> {
        let mut connections = self.connections.lock().await;
        if let Some(connection) = connections.get(url) {
            return Ok(connection.clone());
        }

        let connection = Connection::establish(url).await?;
        connections.insert(url.to_string(), connection.clone());
        Ok(connection)
    }

    /// Connect using a spec's URL resolution (explicit, `NATS_URL`,
    /// local default).
    pub async fn connect_spec(&self, spec: &StreamSpec) -> Result<Connection, ListenError> {
        self.connect(&spec.resolve_url()).await
    }
}

/// A live broker connection plus its reconnect signal.
///
/// Cloning is cheap and all clones share the same client and signal.
#[derive(Debug, Clone)]
pub struct Connection {
    client: Client,
    reconnects: watch::Receiver<u64>,
    url: String,
}

impl Connection {
    /// Assemble a connection from an existing client, reconnect signal and
    /// the URL the client was dialed with.
    ///
    /// Hosts that manage their own `async_nats::Client` (and tests that
    /// simulate reconnect timelines) use this instead of a [`Connector`].
    pub fn new(client: Client, reconnects: watch::Receiver<u64>, url: impl Into<String>) -> Self {
        Self {
            client,
            reconnects,
            url: url.into(),
        }
    }

    async fn establish(url: &str) -> Result<Self, ListenError> {
        let (tx, rx) = watch::channel(0u64);
        let tx = Arc::new(tx);

        let client = ConnectOptions::new()
            .subscription_capacity(SUBSCRIPTION_CAPACITY)
            .event_callback(move |event| {
                let tx = tx.clone();
                async move {
                    match event {
                        Event::Connected => {
                            debug!("broker connection re-established");
                            tx.send_modify(|generation| *generation += 1);
                        }
                        Event::Disconnected => warn!("broker connection lost"),
                        other => debug!(event = %other, "broker connection event"),
                    }
                }
            })
            .connect(url)
            .await
            .map_err(|source| ListenError::Connect {
                url: url.to_string(),
                source,
            })?;

        debug!(url = %url, "connected to broker");
        Ok(Self::new(client, rx, url))
    }

    /// The shared broker client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The URL this connection was dialed with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// A fresh receiver over the reconnect generation counter. The value
    /// bumps every time the connection is re-established; `changed()`
    /// resolving means any in-flight server-side state (such as a pending
    /// pull request) is gone and must be set up again.
    pub fn reconnects(&self) -> watch::Receiver<u64> {
        self.reconnects.clone()
    }
}
