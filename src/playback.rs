//! Serialized local playback on a dedicated worker thread.
//!
//! Inbound texts are queued without blocking the caller. One worker drains
//! the queue in FIFO order and speaks each text to completion before taking
//! the next, so audio never overlaps.

use crate::defaults;
use crate::error::{MirrorError, Result};
use crate::speech::Speaker;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Worker parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// How often an idle worker checks for shutdown.
    pub poll_interval: Duration,
    /// Reject new items beyond this many pending. `None` is unbounded.
    pub max_pending: Option<usize>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(defaults::PLAYBACK_POLL_MS),
            max_pending: None,
        }
    }
}

/// Shared "now playing" state.
#[derive(Default)]
pub struct PlaybackState {
    now_playing: Mutex<()>,
    playing: AtomicBool,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Speak `text` while holding the playback lock.
    ///
    /// A panicking speaker is reported as an error.
    pub fn play(&self, speaker: &dyn Speaker, text: &str) -> Result<()> {
        let _guard = self
            .now_playing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.playing.store(true, Ordering::SeqCst);

        let result = panic::catch_unwind(AssertUnwindSafe(|| speaker.speak(text)))
            .unwrap_or_else(|_| Err(MirrorError::Other(format!("{} panicked", speaker.name()))));

        self.playing.store(false, Ordering::SeqCst);
        result
    }
}

/// Producer side of the playback queue. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackQueue {
    tx: Sender<String>,
}

impl PlaybackQueue {
    /// Queue `text` for playback. Blank text is ignored.
    ///
    /// Returns false if the text was not queued: it was blank, the queue is
    /// full or the worker has stopped.
    pub fn enqueue(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        match self.tx.try_send(text.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(text = %defaults::preview(text), "Playback queue full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Playback worker stopped, dropping");
                false
            }
        }
    }

    /// Items waiting to be played.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Builder for the playback thread.
pub struct PlaybackWorker {
    config: PlaybackConfig,
}

impl PlaybackWorker {
    pub fn new(config: PlaybackConfig) -> Self {
        Self { config }
    }

    /// Spawn the worker thread speaking through `speaker`.
    pub fn start(self, speaker: Arc<dyn Speaker>) -> Result<PlaybackHandle> {
        let (tx, rx) = match self.config.max_pending {
            Some(max) => bounded(max.max(1)),
            None => unbounded(),
        };
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(PlaybackState::new());

        let loop_running = Arc::clone(&running);
        let loop_state = Arc::clone(&state);
        let poll = self.config.poll_interval;
        let thread = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                run_playback_loop(&rx, speaker.as_ref(), &loop_state, &loop_running, poll)
            })
            .map_err(|e| MirrorError::Other(format!("Failed to spawn playback thread: {}", e)))?;

        Ok(PlaybackHandle {
            queue: PlaybackQueue { tx },
            state,
            running,
            thread: Some(thread),
        })
    }
}

fn run_playback_loop(
    rx: &Receiver<String>,
    speaker: &dyn Speaker,
    state: &PlaybackState,
    running: &AtomicBool,
    poll: Duration,
) {
    debug!(speaker = speaker.name(), "Playback worker started");
    while running.load(Ordering::SeqCst) {
        let text = match rx.recv_timeout(poll) {
            Ok(text) => text,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if !running.load(Ordering::SeqCst) {
            break;
        }

        if let Err(e) = state.play(speaker, &text) {
            error!(error = %e, text = %defaults::preview(&text), "Playback failed");
        }
    }
    debug!("Playback worker stopped");
}

/// Handle to the running playback thread.
pub struct PlaybackHandle {
    queue: PlaybackQueue,
    state: Arc<PlaybackState>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    pub fn queue(&self) -> PlaybackQueue {
        self.queue.clone()
    }

    pub fn state(&self) -> Arc<PlaybackState> {
        Arc::clone(&self.state)
    }

    pub fn enqueue(&self, text: &str) -> bool {
        self.queue.enqueue(text)
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Stop taking new items and wait for the current one to finish.
    ///
    /// Items still queued are discarded.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Playback thread panicked");
        }
    }
}
