//! Bounded record of received utterances.

use crate::utterance::Utterance;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// The last `limit` utterances in arrival order.
///
/// Safe to share between the inbound callback and monitor readers.
pub struct MessageHistory {
    limit: usize,
    entries: Mutex<VecDeque<Utterance>>,
}

impl MessageHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Record `utterance`, evicting the oldest entry when full.
    pub fn push(&self, utterance: Utterance) {
        if self.limit == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.limit {
            entries.pop_front();
        }
        entries.push_back(utterance);
    }

    /// Copy of the entries, newest first.
    pub fn latest_first(&self) -> Vec<Utterance> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
