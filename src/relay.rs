//! Ordered, chunked relay of utterances to the mirror topic.
//!
//! One relay runs at a time: the chunks of an utterance go out contiguously
//! and in reading order, never interleaved with another utterance's chunks.
//! The first failed chunk aborts the rest of that utterance.

use crate::chunker::chunk;
use crate::connection::ConnectionManager;
use crate::defaults;
use crate::error::{MirrorError, Result};
use crate::transport::QoS;
use crate::utterance::Utterance;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Relay parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub mirror_topic: String,
    /// Maximum characters per published chunk.
    pub max_chunk_size: usize,
    /// Pause after each chunk except the last.
    pub pacing: Duration,
    /// Polls for a connection before publishing regardless.
    pub reconnect_attempts: u32,
    pub reconnect_poll: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            mirror_topic: defaults::MIRROR_TOPIC.to_string(),
            max_chunk_size: defaults::MAX_CHUNK_SIZE,
            pacing: Duration::from_millis(defaults::CHUNK_PACING_MS),
            reconnect_attempts: defaults::RECONNECT_ATTEMPTS,
            reconnect_poll: Duration::from_millis(defaults::RECONNECT_POLL_MS),
        }
    }
}

/// Result of relaying one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Nothing to relay: the text was empty or whitespace.
    Skipped,
    /// Every chunk was published.
    Delivered { chunks: usize },
    /// Publishing stopped at chunk `published + 1` of `total`.
    Partial { published: usize, total: usize },
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered { .. })
    }
}

/// Publishes utterances to the mirror topic chunk by chunk.
pub struct OrderedRelay {
    connection: Arc<ConnectionManager>,
    settings: RelaySettings,
    in_flight: Mutex<()>,
}

impl OrderedRelay {
    pub fn new(connection: Arc<ConnectionManager>, settings: RelaySettings) -> Self {
        Self {
            connection,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Relay `text` to the mirror topic.
    ///
    /// Concurrent calls are serialized. If the connection is down, one
    /// bounded reconnect is attempted first; publishing then proceeds either
    /// way and fails fast per chunk when still disconnected.
    pub fn relay(&self, text: &str) -> RelayOutcome {
        let text = text.trim();
        if text.is_empty() {
            return RelayOutcome::Skipped;
        }

        let _in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !self.connection.is_connected()
            && !self
                .connection
                .ensure_connected(self.settings.reconnect_attempts, self.settings.reconnect_poll)
        {
            warn!("Broker still unavailable, relaying anyway");
        }

        let chunks = chunk(text, self.settings.max_chunk_size);
        let total = chunks.len();
        let topic = &self.settings.mirror_topic;

        for (i, piece) in chunks.iter().enumerate() {
            if let Err(e) = self.connection.publish(topic, piece, QoS::AtLeastOnce) {
                warn!(
                    chunk = i + 1,
                    total,
                    error = %e,
                    "Failed to publish chunk {}/{}, dropping the rest of the utterance",
                    i + 1,
                    total
                );
                return RelayOutcome::Partial {
                    published: i,
                    total,
                };
            }
            debug!(chunk = i + 1, total, text = %defaults::preview(piece), "Chunk published");

            if i + 1 < total && !self.settings.pacing.is_zero() {
                thread::sleep(self.settings.pacing);
            }
        }

        info!(chunks = total, text = %defaults::preview(text), "Mirrored");
        RelayOutcome::Delivered { chunks: total }
    }

    /// Run relays on a dedicated thread fed by the returned sender.
    ///
    /// The thread polls for shutdown every `poll` while idle.
    pub fn spawn_worker(
        self: &Arc<Self>,
        poll: Duration,
    ) -> Result<(Sender<Utterance>, RelayWorker)> {
        let (tx, rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let relay = Arc::clone(self);
        let loop_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("relay".to_string())
            .spawn(move || run_relay_loop(&relay, &rx, &loop_running, poll))
            .map_err(|e| MirrorError::Other(format!("Failed to spawn relay thread: {}", e)))?;

        Ok((
            tx,
            RelayWorker {
                running,
                thread: Some(thread),
            },
        ))
    }
}

fn run_relay_loop(
    relay: &OrderedRelay,
    rx: &Receiver<Utterance>,
    running: &AtomicBool,
    poll: Duration,
) {
    debug!("Relay worker started");
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(poll) {
            Ok(utterance) => {
                relay.relay(utterance.text());
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Relay worker stopped");
}

/// Handle to the relay thread.
pub struct RelayWorker {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RelayWorker {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop after the relay in progress, if any, finishes.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Relay thread panicked");
        }
    }
}
