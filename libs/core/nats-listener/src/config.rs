//! Stream and consumer specs.
//!
//! A [`ConsumerSpec`] is the complete, serializable identity of a durable
//! cursor: enough for a freshly started process to reconnect and resume.
//! Its JSON form is the invocation payload handed to downstream compute by
//! the poll loop.

use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable consulted when a spec carries no broker URL.
pub const ENV_NATS_URL: &str = "NATS_URL";

/// Broker URL used when neither the spec nor the environment provides one.
pub const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";

/// Identity of a durable, named stream and the subjects it captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Stream name.
    pub name: String,
    /// Subjects the stream captures.
    pub subjects: Vec<String>,
    /// Broker URL override. When `None`, `NATS_URL` and then the local
    /// default are used.
    pub nats_url: Option<String>,
}

impl StreamSpec {
    /// Create a spec with no URL override.
    pub fn new(name: impl Into<String>, subjects: Vec<String>) -> Self {
        Self {
            name: name.into(),
            subjects,
            nats_url: None,
        }
    }

    /// Resolve the broker URL: explicit override, then `NATS_URL`, then
    /// the local default.
    pub fn resolve_url(&self) -> String {
        if let Some(url) = &self.nats_url {
            if !url.is_empty() {
                return url.clone();
            }
        }
        if let Ok(url) = env::var(ENV_NATS_URL) {
            if !url.is_empty() {
                return url;
            }
        }
        DEFAULT_NATS_URL.to_string()
    }
}

/// Identity of a durable consumer: the stream it reads, the cursor name,
/// and the downstream handler to invoke when new work is observed.
///
/// Reusing `name` resumes the same cursor; a new name starts a fresh one
/// positioned at the beginning of retained history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSpec {
    /// The stream this consumer reads.
    pub stream: StreamSpec,
    /// Durable consumer name.
    pub name: String,
    /// Downstream invocation target identity (function name, URL, ...).
    pub handler: String,
}

impl ConsumerSpec {
    pub fn new(stream: StreamSpec, name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            stream,
            name: name.into(),
            handler: handler.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_prefers_explicit() {
        temp_env::with_var(ENV_NATS_URL, Some("nats://from-env:4222"), || {
            let mut spec = StreamSpec::new("logs", vec!["logs.>".to_string()]);
            spec.nats_url = Some("nats://explicit:4222".to_string());
            assert_eq!(spec.resolve_url(), "nats://explicit:4222");
        });
    }

    #[test]
    fn test_resolve_url_falls_back_to_env() {
        temp_env::with_var(ENV_NATS_URL, Some("nats://from-env:4222"), || {
            let spec = StreamSpec::new("logs", vec!["logs.>".to_string()]);
            assert_eq!(spec.resolve_url(), "nats://from-env:4222");
        });
    }

    #[test]
    fn test_resolve_url_default() {
        temp_env::with_var_unset(ENV_NATS_URL, || {
            let spec = StreamSpec::new("logs", vec!["logs.>".to_string()]);
            assert_eq!(spec.resolve_url(), DEFAULT_NATS_URL);
        });
    }

    #[test]
    fn test_consumer_spec_payload_shape() {
        let spec = ConsumerSpec::new(
            StreamSpec {
                name: "orders".to_string(),
                subjects: vec!["orders.*".to_string()],
                nats_url: Some("nats://10.0.0.7:4222".to_string()),
            },
            "indexer",
            "order-indexer",
        );

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "stream": {
                    "name": "orders",
                    "subjects": ["orders.*"],
                    "nats_url": "nats://10.0.0.7:4222",
                },
                "name": "indexer",
                "handler": "order-indexer",
            })
        );

        let back: ConsumerSpec = serde_json::from_value(value).unwrap();
        assert_eq!(back, spec);
    }
}
