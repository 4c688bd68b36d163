//! The unit of text the relay mirrors and the worker speaks.

use chrono::{DateTime, Local};
use serde::Serialize;

/// One received utterance. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    text: String,
    topic: String,
    received_at: DateTime<Local>,
}

impl Utterance {
    /// Create an utterance received now on `topic`.
    pub fn new(text: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::with_timestamp(text, topic, Local::now())
    }

    /// Create an utterance with an explicit arrival time.
    pub fn with_timestamp(
        text: impl Into<String>,
        topic: impl Into<String>,
        received_at: DateTime<Local>,
    ) -> Self {
        Self {
            text: text.into(),
            topic: topic.into(),
            received_at,
        }
    }

    /// Decode an inbound payload.
    ///
    /// Returns `None` for invalid UTF-8 or text that is empty after trimming.
    pub fn from_payload(topic: &str, payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self::new(text, topic))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }
}
