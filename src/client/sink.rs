//! Delivery sinks
//!
//! Where a subscription puts each delivered message. The session renders
//! the timestamp before handing the message over, substituting a
//! placeholder when the message carries none, so a sink never has to deal
//! with a missing clock.

use crate::protocol::RelayMessage;

/// Consumer of delivered messages
pub trait MessageSink {
    /// Handle one delivery
    ///
    /// `timestamp` is pre-rendered as `HH:MM:SS`, or the placeholder for
    /// stampless messages.
    fn deliver(&mut self, message: &RelayMessage, timestamp: &str);
}

/// Sink that prints deliveries to stdout
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl MessageSink for ConsoleSink {
    fn deliver(&mut self, message: &RelayMessage, timestamp: &str) {
        println!(
            "[{}] {}: {}",
            timestamp, message.publisher_id, message.content
        );
    }
}

/// Sink that records deliveries in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Recorded `(timestamp, publisher, content)` rows
    pub entries: Vec<(String, String, String)>,
}

impl MessageSink for MemorySink {
    fn deliver(&mut self, message: &RelayMessage, timestamp: &str) {
        self.entries.push((
            timestamp.to_string(),
            message.publisher_id.clone(),
            message.content.clone(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    #[test]
    fn test_rendered_timestamps() {
        let stamp = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        let stamped = RelayMessage::new("alice", "hi").with_timestamp(stamp);
        let stampless = RelayMessage::new("bob", "hello");

        assert_eq!(stamped.format_timestamp(), stamp.format("%H:%M:%S").to_string());
        assert_eq!(stampless.format_timestamp(), "unknown");
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let mut sink = MemorySink::default();
        let first = RelayMessage::new("alice", "one");
        let second = RelayMessage::new("bob", "two");

        sink.deliver(&first, &first.format_timestamp());
        sink.deliver(&second, &second.format_timestamp());

        assert_eq!(sink.entries.len(), 2);
        assert_eq!(sink.entries[0], ("unknown".into(), "alice".into(), "one".into()));
        assert_eq!(sink.entries[1], ("unknown".into(), "bob".into(), "two".into()));
    }
}
