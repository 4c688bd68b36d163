//! Service mode: wires the relay, the playback worker and the monitor
//! together and runs until SIGINT or SIGTERM.

pub mod dispatch;

pub use dispatch::Dispatcher;

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::error::{MirrorError, Result};
use crate::monitor::{MessageHistory, MonitorServer, ServiceStatus, StatusSource};
use crate::playback::{PlaybackHandle, PlaybackWorker};
use crate::relay::{OrderedRelay, RelayWorker};
use crate::speech::{PiperSpeaker, Speaker};
use crate::transport::{MqttTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The running relay and playback pipeline.
pub struct Service {
    connection: Arc<ConnectionManager>,
    relay: Option<RelayWorker>,
    playback: Option<PlaybackHandle>,
    history: Arc<MessageHistory>,
    status: Arc<ServiceStatus>,
}

impl Service {
    /// Validate `config`, start the workers and begin connecting.
    ///
    /// Playback runs only if it is enabled and a `speaker` is given.
    pub fn start(
        config: &Config,
        transport: Arc<dyn Transport>,
        speaker: Option<Arc<dyn Speaker>>,
    ) -> Result<Self> {
        config.validate()?;

        let connection = Arc::new(ConnectionManager::new(
            transport,
            config.connection_settings(),
        ));
        let history = Arc::new(MessageHistory::new(config.monitor.history_limit));

        let playback = match speaker {
            Some(speaker) if config.playback.enabled => {
                info!(speaker = speaker.name(), "Starting playback worker");
                Some(PlaybackWorker::new(config.playback_config()).start(speaker)?)
            }
            _ => None,
        };

        let relay = Arc::new(OrderedRelay::new(
            Arc::clone(&connection),
            config.relay_settings(),
        ));
        let (relay_tx, relay_worker) =
            relay.spawn_worker(Duration::from_millis(config.playback.poll_ms))?;

        connection.set_inbound_sink(Arc::new(Dispatcher::new(
            Arc::clone(&history),
            playback.as_ref().map(PlaybackHandle::queue),
            relay_tx,
        )));

        let status = Arc::new(ServiceStatus::new(
            Arc::clone(&connection),
            playback.as_ref().map(PlaybackHandle::state),
            Arc::clone(&history),
        ));

        connection.connect();

        Ok(Self {
            connection,
            relay: Some(relay_worker),
            playback,
            history,
            status,
        })
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn history(&self) -> &Arc<MessageHistory> {
        &self.history
    }

    pub fn status(&self) -> Arc<dyn StatusSource> {
        self.status.clone()
    }

    /// Stop playback (the current item finishes), stop the relay and close
    /// the broker connection.
    pub fn shutdown(mut self) {
        if let Some(playback) = self.playback.take() {
            playback.stop();
        }
        if let Some(relay) = self.relay.take() {
            relay.stop();
        }
        self.connection.close();
        info!("Service stopped");
    }
}

/// Run the service over MQTT with Piper playback until a shutdown signal.
pub async fn run_daemon(config: Config) -> Result<()> {
    config.validate()?;

    info!(
        host = %config.mqtt.host,
        port = config.mqtt.port,
        inbound = %config.mqtt.inbound_topic,
        mirror = %config.mqtt.mirror_topic,
        "Starting tts-mirror"
    );

    let transport: Arc<dyn Transport> = Arc::new(MqttTransport::new(config.mqtt_settings()));
    let speaker: Option<Arc<dyn Speaker>> = if config.playback.enabled {
        info!(
            piper = %config.synthesis.piper_bin.display(),
            model = %config.synthesis.piper_model.display(),
            "Local playback enabled"
        );
        Some(Arc::new(PiperSpeaker::new(config.piper_config())))
    } else {
        None
    };

    // Bind before any worker thread starts.
    let server = if config.monitor.enabled {
        Some(MonitorServer::bind(&config.monitor_addr()).await?)
    } else {
        None
    };

    let service = Service::start(&config, transport, speaker)?;

    let monitor = server.map(|server| {
        let stopper = server.stopper();
        let task = tokio::spawn(server.serve(service.status()));
        (stopper, task)
    });

    // Wait for SIGTERM or SIGINT
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                warn!(error = %e, "Error setting up signal handler");
            }
            info!("Received SIGTERM, shutting down");
        }
    }

    if let Some((stopper, task)) = monitor {
        stopper.stop();
        match task.await {
            Ok(Err(e)) => warn!(error = %e, "Monitor server failed"),
            Err(e) => warn!(error = %e, "Monitor server task failed"),
            Ok(Ok(())) => {}
        }
    }

    // Joining worker threads blocks.
    tokio::task::spawn_blocking(move || service.shutdown())
        .await
        .map_err(|e| MirrorError::Other(format!("Shutdown task failed: {}", e)))?;

    Ok(())
}

/// Wait for SIGTERM signal (used by systemd).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| MirrorError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    // On non-Unix, just wait forever (Ctrl+C will still work)
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::speech::MockSpeaker;
    use crate::transport::MockTransport;
    use std::thread;
    use std::time::Instant;

    const INBOUND: &str = "moxie/internal/tts";
    const MIRROR: &str = "moxie/tts/text";

    fn test_config() -> Config {
        let mut config = Config::default();
        config.relay.pacing_ms = 0;
        config.playback.poll_ms = 10;
        config
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_connects_subscribes_and_announces() {
        let transport = Arc::new(MockTransport::new());
        let service = Service::start(&test_config(), transport.clone(), None).unwrap();

        assert_eq!(service.connection().state(), ConnectionState::Connected);
        assert_eq!(transport.subscriptions()[0].0, INBOUND);
        assert_eq!(transport.payloads(MIRROR), vec!["OK ES-MQTT"]);

        service.shutdown();
        assert_eq!(transport.disconnect_calls(), 1);
    }

    #[test]
    fn test_inbound_message_is_mirrored_spoken_and_recorded() {
        let transport = Arc::new(MockTransport::new());
        let speaker = Arc::new(MockSpeaker::new());
        let service =
            Service::start(&test_config(), transport.clone(), Some(speaker.clone())).unwrap();

        transport.fire_message(INBOUND, " Hola mundo ".as_bytes());

        wait_until(|| transport.payloads(MIRROR).len() == 2 && speaker.spoken().len() == 1);
        assert_eq!(transport.payloads(MIRROR), vec!["OK ES-MQTT", "Hola mundo"]);
        assert_eq!(speaker.spoken(), vec!["Hola mundo"]);
        assert_eq!(service.history().len(), 1);

        let snapshot = service.status().snapshot();
        assert!(snapshot.connected);
        assert_eq!(snapshot.messages[0].text(), "Hola mundo");

        service.shutdown();
    }

    #[test]
    fn test_disabled_playback_ignores_speaker() {
        let transport = Arc::new(MockTransport::new());
        let speaker = Arc::new(MockSpeaker::new());
        let mut config = test_config();
        config.playback.enabled = false;
        let service = Service::start(&config, transport.clone(), Some(speaker.clone())).unwrap();

        transport.fire_message(INBOUND, b"Hola");
        wait_until(|| transport.payloads(MIRROR).len() == 2);

        assert!(speaker.spoken().is_empty());
        service.shutdown();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = test_config();
        config.relay.max_chunk_size = 0;
        let result = Service::start(&config, Arc::new(MockTransport::new()), None);
        assert!(matches!(result, Err(MirrorError::ConfigInvalidValue { .. })));
    }
}
