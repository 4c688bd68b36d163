//! Fan-out of inbound utterances to history, playback and the relay.

use crate::connection::InboundSink;
use crate::defaults;
use crate::monitor::MessageHistory;
use crate::playback::PlaybackQueue;
use crate::utterance::Utterance;
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hands each inbound utterance to every consumer without blocking.
///
/// Playback and relay are independent: a full playback queue does not stop
/// the utterance from being mirrored, and vice versa.
pub struct Dispatcher {
    history: Arc<MessageHistory>,
    playback: Option<PlaybackQueue>,
    relay: Sender<Utterance>,
}

impl Dispatcher {
    pub fn new(
        history: Arc<MessageHistory>,
        playback: Option<PlaybackQueue>,
        relay: Sender<Utterance>,
    ) -> Self {
        Self {
            history,
            playback,
            relay,
        }
    }
}

impl InboundSink for Dispatcher {
    fn deliver(&self, utterance: Utterance) {
        info!(
            topic = utterance.topic(),
            text = %defaults::preview(utterance.text()),
            "Received"
        );

        self.history.push(utterance.clone());

        if let Some(playback) = &self.playback
            && !playback.enqueue(utterance.text())
        {
            debug!("Utterance not queued for playback");
        }

        if self.relay.send(utterance).is_err() {
            warn!("Relay worker stopped, utterance not mirrored");
        }
    }
}
