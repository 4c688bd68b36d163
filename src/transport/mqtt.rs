//! MQTT transport over `rumqttc`'s synchronous client.
//!
//! `connect` spawns one network-loop thread that drives the `rumqttc`
//! connection, translates its notifications into [`TransportEvents`] and
//! sleeps with [`Backoff`] between failed attempts. `rumqttc` reconnects on
//! the next poll after an error, so the loop only has to pace it.

use crate::defaults;
use crate::error::{MirrorError, Result};
use crate::transport::{Backoff, DisconnectReason, QoS, Transport, TransportEvents};
use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Outgoing, Packet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Slice used while sleeping so `disconnect` is honoured promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    pub request_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: defaults::MQTT_HOST.to_string(),
            port: defaults::MQTT_PORT,
            client_id: defaults::MQTT_CLIENT_ID.to_string(),
            keep_alive: Duration::from_secs(defaults::KEEP_ALIVE_SECS),
            reconnect_min: Duration::from_secs(defaults::RECONNECT_MIN_SECS),
            reconnect_max: Duration::from_secs(defaults::RECONNECT_MAX_SECS),
            request_capacity: defaults::REQUEST_CAPACITY,
        }
    }
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options
    }
}

/// A running network loop.
struct NetworkLoop {
    client: Client,
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// MQTT transport with automatic reconnection.
pub struct MqttTransport {
    settings: MqttSettings,
    active: Mutex<Option<NetworkLoop>>,
}

impl MqttTransport {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            active: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    /// Client handle of the running loop, if any.
    fn client(&self) -> Result<Client> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active
            .as_ref()
            .map(|network| network.client.clone())
            .ok_or(MirrorError::NotConnected)
    }
}

impl Transport for MqttTransport {
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<()> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(network) = active.as_ref()
            && !network.thread.is_finished()
        {
            debug!("MQTT network loop already running");
            return Ok(());
        }

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            "Connecting to MQTT broker"
        );

        let (client, connection) =
            Client::new(self.settings.options(), self.settings.request_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let backoff = Backoff::new(self.settings.reconnect_min, self.settings.reconnect_max);

        let loop_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("mqtt-network".to_string())
            .spawn(move || run_network_loop(connection, events, loop_running, backoff))
            .map_err(|e| MirrorError::ConnectFailed {
                message: format!("Failed to spawn network thread: {}", e),
            })?;

        *active = Some(NetworkLoop {
            client,
            running,
            thread,
        });
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        self.client()?
            .try_subscribe(topic, qos.into())
            .map_err(|e| MirrorError::SubscribeFailed {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<()> {
        self.client()?
            .try_publish(topic, qos.into(), false, payload.as_bytes().to_vec())
            .map_err(|e| MirrorError::PublishFailed {
                message: e.to_string(),
            })
    }

    fn disconnect(&self) -> Result<()> {
        // Release the lock before joining: the loop's callbacks publish.
        let network = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(network) = network else {
            return Ok(());
        };

        // Queued publishes go out before the disconnect request.
        network.running.store(false, Ordering::SeqCst);
        if let Err(e) = network.client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request not queued");
        }
        if network.thread.thread().id() == thread::current().id() {
            return Ok(());
        }
        network.thread.join().map_err(|_| {
            MirrorError::Other("MQTT network thread panicked".to_string())
        })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!(error = %e, "MQTT transport shutdown failed");
        }
    }
}

/// Drive the connection until `running` is cleared.
fn run_network_loop(
    mut connection: Connection,
    events: Arc<dyn TransportEvents>,
    running: Arc<AtomicBool>,
    mut backoff: Backoff,
) {
    let mut connected = false;

    for notification in connection.iter() {
        // Once stopping, keep flushing queued requests until the disconnect
        // goes out or the connection fails.
        let stopping = !running.load(Ordering::SeqCst);
        if stopping && matches!(notification, Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_)) {
            break;
        }

        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    connected = true;
                    backoff.reset();
                    events.on_connect(Ok(()));
                } else {
                    events.on_connect(Err(format!("{:?}", ack.code)));
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                events.on_message(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                if connected {
                    connected = false;
                    events.on_disconnect(DisconnectReason::Lost(
                        "broker closed the session".to_string(),
                    ));
                }
            }
            Ok(_) => {}
            Err(e) => {
                if connected {
                    connected = false;
                    events.on_disconnect(DisconnectReason::Lost(e.to_string()));
                } else {
                    events.on_connect(Err(e.to_string()));
                }

                let delay = backoff.next_delay();
                debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
                if !sleep_while_running(delay, &running) {
                    break;
                }
            }
        }
    }

    if connected {
        events.on_disconnect(DisconnectReason::Requested);
    }
    debug!("MQTT network loop stopped");
}

/// Sleep for `duration` in short slices. Returns false if `running` was
/// cleared meanwhile.
fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
