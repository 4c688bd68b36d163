//! Broker connection lifecycle: connect, reconnect, one-time startup
//! announcement, inbound routing and state queries.
//!
//! [`ConnectionManager`] owns the only mutable connection state. Transport
//! callbacks and relay calls may arrive concurrently from different threads;
//! the state and the startup flag sit behind one mutex, and no transport call
//! is made while it is held.

use crate::defaults;
use crate::error::{MirrorError, Result};
use crate::transport::{DisconnectReason, QoS, Transport, TransportEvents};
use crate::utterance::Utterance;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection state as seen by the relay and the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// When the startup marker is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupAnnouncement {
    /// Only after the first successful connection of a manager instance.
    #[default]
    Once,
    /// After every successful connection, reconnects included.
    EveryConnect,
    /// Never; for one-shot clients.
    Never,
}

/// Receiver of decoded inbound utterances.
///
/// Called on the transport's network thread; must not block.
pub trait InboundSink: Send + Sync {
    fn deliver(&self, utterance: Utterance);
}

/// Static parameters of a [`ConnectionManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Topic the startup marker goes to.
    pub mirror_topic: String,
    /// Topic subscribed on every successful connect, if any.
    pub inbound_topic: Option<String>,
    pub announce: StartupAnnouncement,
    pub startup_marker: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            mirror_topic: defaults::MIRROR_TOPIC.to_string(),
            inbound_topic: None,
            announce: StartupAnnouncement::Once,
            startup_marker: defaults::STARTUP_MARKER.to_string(),
        }
    }
}

struct Inner {
    state: ConnectionState,
    startup_sent: bool,
    closed: bool,
    /// Bumped on every disconnect.
    generation: u64,
}

/// State shared with the transport's callbacks.
struct Core {
    transport: Arc<dyn Transport>,
    settings: ConnectionSettings,
    inner: Mutex<Inner>,
    sink: Mutex<Option<Arc<dyn InboundSink>>>,
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<()> {
        {
            let inner = self.lock();
            if inner.closed {
                return Err(MirrorError::TransportClosed);
            }
            if inner.state != ConnectionState::Connected {
                return Err(MirrorError::NotConnected);
            }
        }
        self.transport.publish(topic, payload, qos)
    }
}

impl TransportEvents for Core {
    fn on_connect(&self, result: std::result::Result<(), String>) {
        // Stays `Connecting` until the subscription and marker are out, so
        // no relayed chunk can reach the mirror topic ahead of the marker.
        let (announce, generation) = {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            match &result {
                Ok(()) => {
                    inner.state = ConnectionState::Connecting;
                    let announce = match self.settings.announce {
                        StartupAnnouncement::Once => !inner.startup_sent,
                        StartupAnnouncement::EveryConnect => true,
                        StartupAnnouncement::Never => false,
                    };
                    inner.startup_sent |= announce;
                    (announce, inner.generation)
                }
                Err(_) => {
                    inner.state = ConnectionState::Disconnected;
                    (false, inner.generation)
                }
            }
        };

        if let Err(reason) = result {
            warn!(transport = self.transport.name(), %reason, "Broker connection failed");
            return;
        }
        info!(transport = self.transport.name(), "Connected to broker");

        if let Some(topic) = &self.settings.inbound_topic {
            match self.transport.subscribe(topic, QoS::AtLeastOnce) {
                Ok(()) => info!(%topic, "Subscribed"),
                Err(e) => warn!(%topic, error = %e, "Subscribe failed"),
            }
        }

        if announce {
            let topic = &self.settings.mirror_topic;
            match self
                .transport
                .publish(topic, &self.settings.startup_marker, QoS::AtLeastOnce)
            {
                Ok(()) => info!(%topic, "Startup marker published"),
                Err(e) => warn!(error = %e, "Startup marker not published"),
            }
        }

        let mut inner = self.lock();
        if !inner.closed && inner.generation == generation {
            inner.state = ConnectionState::Connected;
        }
    }

    fn on_disconnect(&self, reason: DisconnectReason) {
        {
            let mut inner = self.lock();
            inner.state = ConnectionState::Disconnected;
            inner.generation += 1;
        }
        match reason {
            DisconnectReason::Requested => info!("Disconnected from broker"),
            DisconnectReason::Lost(reason) => {
                warn!(%reason, "Unexpectedly disconnected from broker")
            }
        }
    }

    fn on_message(&self, topic: &str, payload: &[u8]) {
        let Some(utterance) = Utterance::from_payload(topic, payload) else {
            if std::str::from_utf8(payload).is_err() {
                warn!(%topic, bytes = payload.len(), "Dropping non-UTF-8 message");
            } else {
                debug!(%topic, "Ignoring empty message");
            }
            return;
        };

        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => sink.deliver(utterance),
            None => debug!(%topic, "No inbound sink registered, dropping message"),
        }
    }
}

/// Owns one transport connection's lifecycle.
pub struct ConnectionManager {
    core: Arc<Core>,
}

impl ConnectionManager {
    /// A manager in the `Disconnected` state. Nothing happens until
    /// [`connect`](Self::connect).
    pub fn new(transport: Arc<dyn Transport>, settings: ConnectionSettings) -> Self {
        Self {
            core: Arc::new(Core {
                transport,
                settings,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    startup_sent: false,
                    closed: false,
                    generation: 0,
                }),
                sink: Mutex::new(None),
            }),
        }
    }

    /// Route inbound messages to `sink`.
    pub fn set_inbound_sink(&self, sink: Arc<dyn InboundSink>) {
        *self
            .core
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.core.settings
    }

    /// Start connecting. Failures are logged and leave the manager
    /// `Disconnected`; they are never returned.
    pub fn connect(&self) {
        {
            let mut inner = self.core.lock();
            if inner.closed {
                debug!("Connection manager closed, not connecting");
                return;
            }
            if inner.state != ConnectionState::Disconnected {
                return;
            }
            inner.state = ConnectionState::Connecting;
        }

        let events: Arc<dyn TransportEvents> = self.core.clone();
        if let Err(e) = self.core.transport.connect(events) {
            self.core.lock().state = ConnectionState::Disconnected;
            warn!(error = %e, "Could not start broker connection");
        }
    }

    /// Publish if connected. Fails immediately with `NotConnected` otherwise.
    pub fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<()> {
        self.core.publish(topic, payload, qos)
    }

    pub fn state(&self) -> ConnectionState {
        self.core.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether the startup marker has been attempted by this instance.
    pub fn startup_announced(&self) -> bool {
        self.core.lock().startup_sent
    }

    pub fn is_closed(&self) -> bool {
        self.core.lock().closed
    }

    /// Poll until connected, at most `attempts` times `interval`.
    pub fn wait_until_connected(&self, attempts: u32, interval: Duration) -> bool {
        for _ in 0..attempts {
            if self.is_connected() {
                return true;
            }
            thread::sleep(interval);
        }
        self.is_connected()
    }

    /// Connect if needed and wait a bounded time for the result.
    pub fn ensure_connected(&self, attempts: u32, interval: Duration) -> bool {
        if self.is_connected() {
            return true;
        }
        debug!("Not connected, retrying broker connection");
        self.connect();
        self.wait_until_connected(attempts, interval)
    }

    /// Disconnect and release the transport. Idempotent; the manager cannot
    /// be reconnected afterwards.
    pub fn close(&self) {
        {
            let mut inner = self.core.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.state = ConnectionState::Disconnected;
        }

        if let Err(e) = self.core.transport.disconnect() {
            warn!(error = %e, "Error closing broker connection");
        }
        self.core
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
