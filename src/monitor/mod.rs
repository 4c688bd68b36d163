//! Read-only monitoring surface: connection state, playback flag and recent
//! messages, served over HTTP.

pub mod history;
pub mod page;
pub mod server;

pub use history::MessageHistory;
pub use server::{MonitorServer, MonitorStopper, router};

use crate::connection::{ConnectionManager, ConnectionState};
use crate::playback::PlaybackState;
use crate::utterance::Utterance;
use serde::Serialize;
use std::sync::Arc;

/// Point-in-time view of the service.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub connection: ConnectionState,
    pub connected: bool,
    pub playing: bool,
    pub inbound_topic: String,
    pub mirror_topic: String,
    pub message_count: usize,
    /// Newest first.
    pub messages: Vec<Utterance>,
}

/// Anything that can describe the service's current state.
pub trait StatusSource: Send + Sync {
    fn snapshot(&self) -> MonitorSnapshot;
}

/// Live status assembled from the running components.
pub struct ServiceStatus {
    connection: Arc<ConnectionManager>,
    playback: Option<Arc<PlaybackState>>,
    history: Arc<MessageHistory>,
    inbound_topic: String,
    mirror_topic: String,
}

impl ServiceStatus {
    pub fn new(
        connection: Arc<ConnectionManager>,
        playback: Option<Arc<PlaybackState>>,
        history: Arc<MessageHistory>,
    ) -> Self {
        let settings = connection.settings();
        let inbound_topic = settings.inbound_topic.clone().unwrap_or_default();
        let mirror_topic = settings.mirror_topic.clone();
        Self {
            connection,
            playback,
            history,
            inbound_topic,
            mirror_topic,
        }
    }
}

impl StatusSource for ServiceStatus {
    fn snapshot(&self) -> MonitorSnapshot {
        let connection = self.connection.state();
        let messages = self.history.latest_first();
        MonitorSnapshot {
            connection,
            connected: connection == ConnectionState::Connected,
            playing: self.playback.as_ref().is_some_and(|p| p.is_playing()),
            inbound_topic: self.inbound_topic.clone(),
            mirror_topic: self.mirror_topic.clone(),
            message_count: messages.len(),
            messages,
        }
    }
}
