//! Recording speaker for tests.

use crate::error::{MirrorError, Result};
use crate::speech::Speaker;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Speaker that records what it was asked to say.
///
/// Can be scripted to fail specific texts and to take a while per call,
/// and tracks the highest number of overlapping `speak` calls seen.
#[derive(Default)]
pub struct MockSpeaker {
    spoken: Mutex<Vec<String>>,
    failing: HashSet<String>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with `SynthesisFailed` whenever asked to say `text`.
    pub fn with_failure(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    /// Block each `speak` for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Texts attempted so far, failures included, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Largest number of `speak` calls that ran at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Speaker for MockSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(text) {
            return Err(MirrorError::SynthesisFailed {
                message: format!("scripted failure for {:?}", text),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
