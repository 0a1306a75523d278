//! Durable stream lifecycle.

use crate::config::{ConsumerSpec, StreamSpec};
use crate::connection::{Connection, Connector};
use crate::consumer::Consumer;
use crate::error::ListenError;
use async_nats::jetstream::consumer::{pull, AckPolicy, DeliverPolicy};
use async_nats::jetstream::{self, Context};
use bytes::Bytes;
use tracing::{debug, info};

/// A named durable stream, loaded or created on connect.
#[derive(Debug, Clone)]
pub struct Stream {
    spec: StreamSpec,
    connection: Connection,
    jetstream: Context,
    stream: jetstream::stream::Stream,
}

impl Stream {
    /// Connect to the broker named by the spec and load-or-create the
    /// stream with its subject set.
    pub async fn connect(spec: StreamSpec, connector: &Connector) -> Result<Self, ListenError> {
        let connection = connector.connect_spec(&spec).await?;
        Self::open(spec, connection).await
    }

    /// Load-or-create the stream over an existing connection.
    ///
    /// An already-existing stream with the same name is accepted as-is;
    /// any other broker error is fatal.
    pub async fn open(spec: StreamSpec, connection: Connection) -> Result<Self, ListenError> {
        let jetstream = jetstream::new(connection.client().clone());

        let stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: spec.name.clone(),
                subjects: spec.subjects.clone(),
                ..Default::default()
            })
            .await
            .map_err(|source| ListenError::CreateStream {
                name: spec.name.clone(),
                source,
            })?;

        info!(stream = %spec.name, "stream ready");
        Ok(Self {
            spec,
            connection,
            jetstream,
            stream,
        })
    }

    /// The spec this stream was opened with.
    pub fn spec(&self) -> &StreamSpec {
        &self.spec
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Broker addresses of the live connection: the dialed URL first, then
    /// any cluster addresses the server gossiped. Used to hand connectivity
    /// to a downstream invocation target.
    pub fn servers(&self) -> Vec<String> {
        let mut servers = vec![self.connection.url().to_string()];
        for url in self.connection.client().server_info().connect_urls {
            if !servers.contains(&url) {
                servers.push(url);
            }
        }
        servers
    }

    /// Publish a message into the stream, returning its stream sequence.
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<u64, ListenError> {
        let ack = self
            .jetstream
            .publish(subject.to_string(), payload)
            .await?
            .await?;

        debug!(stream = %self.spec.name, subject = %subject, sequence = ack.sequence, "published");
        Ok(ack.sequence)
    }

    /// Load-or-create the named durable pull consumer on this stream.
    ///
    /// Reusing a name resumes the existing cursor; a new name starts at
    /// the beginning of retained history.
    pub async fn consumer(&self, spec: ConsumerSpec) -> Result<Consumer, ListenError> {
        self.stream
            .get_or_create_consumer(
                &spec.name,
                pull::Config {
                    durable_name: Some(spec.name.clone()),
                    deliver_policy: DeliverPolicy::All,
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|source| ListenError::CreateConsumer {
                name: spec.name.clone(),
                source,
            })?;

        debug!(stream = %self.spec.name, consumer = %spec.name, "consumer ready");
        Ok(Consumer::new(self.spec.name.clone(), spec, self.connection.clone()))
    }
}
