//! The message shape delivered to stream handlers.

use bytes::Bytes;
use std::collections::HashMap;

/// A single message delivered from a durable stream.
///
/// `sequence` is the stream sequence of the message: a monotonically
/// increasing watermark assigned by the broker. It identifies a position in
/// the stream and nothing more — it must never be interpreted as a count of
/// undelivered messages.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Subject the message was published on.
    pub subject: String,
    /// Application headers carried with the message.
    pub headers: HashMap<String, String>,
    /// Raw payload bytes.
    pub payload: Bytes,
    /// Stream sequence of the message.
    pub sequence: u64,
}

impl Message {
    /// Create a message with a subject and payload, no headers.
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            subject: subject.into(),
            headers: HashMap::new(),
            payload: payload.into(),
            sequence,
        }
    }

    /// Look up a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup() {
        let mut message = Message::new("orders.created", "{}", 7);
        message
            .headers
            .insert("content-type".to_string(), "application/json".to_string());

        assert_eq!(message.header("content-type"), Some("application/json"));
        assert_eq!(message.header("missing"), None);
        assert_eq!(message.sequence, 7);
    }
}
