use crate::connection::{ConnectionSettings, StartupAnnouncement};
use crate::defaults;
use crate::error::{MirrorError, Result};
use crate::playback::PlaybackConfig;
use crate::relay::RelaySettings;
use crate::speech::PiperConfig;
use crate::transport::MqttSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub relay: RelayConfig,
    pub synthesis: SynthesisConfig,
    pub playback: PlaybackSection,
    pub monitor: MonitorConfig,
}

/// Broker connection and topics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub inbound_topic: String,
    pub mirror_topic: String,
    pub reconnect_min_secs: u64,
    pub reconnect_max_secs: u64,
    pub announce: StartupAnnouncement,
}

/// Chunking and publish pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub max_chunk_size: usize,
    pub pacing_ms: u64,
    pub reconnect_attempts: u32,
    pub reconnect_poll_ms: u64,
}

/// Piper and audio player settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub piper_bin: PathBuf,
    pub piper_model: PathBuf,
    pub piper_config: Option<PathBuf>,
    pub players: Vec<String>,
    pub player_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
}

/// Local playback worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackSection {
    pub enabled: bool,
    pub poll_ms: u64,
    pub max_pending: Option<usize>,
}

/// HTTP monitor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    pub history_limit: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: defaults::MQTT_HOST.to_string(),
            port: defaults::MQTT_PORT,
            client_id: defaults::MQTT_CLIENT_ID.to_string(),
            keep_alive_secs: defaults::KEEP_ALIVE_SECS,
            inbound_topic: defaults::INBOUND_TOPIC.to_string(),
            mirror_topic: defaults::MIRROR_TOPIC.to_string(),
            reconnect_min_secs: defaults::RECONNECT_MIN_SECS,
            reconnect_max_secs: defaults::RECONNECT_MAX_SECS,
            announce: StartupAnnouncement::Once,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: defaults::MAX_CHUNK_SIZE,
            pacing_ms: defaults::CHUNK_PACING_MS,
            reconnect_attempts: defaults::RECONNECT_ATTEMPTS,
            reconnect_poll_ms: defaults::RECONNECT_POLL_MS,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            piper_bin: PathBuf::from(defaults::PIPER_BIN),
            piper_model: PathBuf::from(defaults::PIPER_MODEL),
            piper_config: Some(PathBuf::from(defaults::PIPER_CONF)),
            players: defaults::AUDIO_PLAYERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            player_timeout_secs: defaults::PLAYER_TIMEOUT_SECS,
            synthesis_timeout_secs: defaults::SYNTHESIS_TIMEOUT_SECS,
        }
    }
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_ms: defaults::PLAYBACK_POLL_MS,
            max_pending: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: defaults::MONITOR_BIND.to_string(),
            port: defaults::MONITOR_PORT,
            history_limit: defaults::HISTORY_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MirrorError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                MirrorError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(MirrorError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - MQTT_HOST → mqtt.host
    /// - MQTT_PORT → mqtt.port
    /// - MQTT_TOPIC_SOURCE → mqtt.inbound_topic
    /// - MQTT_TOPIC_MIRROR → mqtt.mirror_topic
    /// - MAX_CHUNK_SIZE → relay.max_chunk_size
    /// - PIPER_BIN → synthesis.piper_bin
    /// - PIPER_MODEL → synthesis.piper_model
    /// - PIPER_CONF → synthesis.piper_config
    /// - HTTP_PORT → monitor.port
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(host) = env_value("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = env_parsed("MQTT_PORT") {
            self.mqtt.port = port;
        }
        if let Some(topic) = env_value("MQTT_TOPIC_SOURCE") {
            self.mqtt.inbound_topic = topic;
        }
        if let Some(topic) = env_value("MQTT_TOPIC_MIRROR") {
            self.mqtt.mirror_topic = topic;
        }
        if let Some(size) = env_parsed("MAX_CHUNK_SIZE") {
            self.relay.max_chunk_size = size;
        }
        if let Some(bin) = env_value("PIPER_BIN") {
            self.synthesis.piper_bin = PathBuf::from(bin);
        }
        if let Some(model) = env_value("PIPER_MODEL") {
            self.synthesis.piper_model = PathBuf::from(model);
        }
        if let Some(conf) = env_value("PIPER_CONF") {
            self.synthesis.piper_config = Some(PathBuf::from(conf));
        }
        if let Some(port) = env_parsed("HTTP_PORT") {
            self.monitor.port = port;
        }

        self
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Result<()> {
            Err(MirrorError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        }

        if self.relay.max_chunk_size == 0 {
            return invalid("relay.max_chunk_size", "must be at least 1");
        }
        if self.mqtt.port == 0 {
            return invalid("mqtt.port", "must not be 0");
        }
        if self.mqtt.host.trim().is_empty() {
            return invalid("mqtt.host", "must not be empty");
        }
        if self.mqtt.inbound_topic.trim().is_empty() {
            return invalid("mqtt.inbound_topic", "must not be empty");
        }
        if self.mqtt.mirror_topic.trim().is_empty() {
            return invalid("mqtt.mirror_topic", "must not be empty");
        }
        if self.mqtt.inbound_topic == self.mqtt.mirror_topic {
            return invalid(
                "mqtt.mirror_topic",
                "must differ from mqtt.inbound_topic",
            );
        }
        if self.mqtt.reconnect_min_secs == 0 {
            return invalid("mqtt.reconnect_min_secs", "must be at least 1");
        }
        if self.mqtt.reconnect_min_secs > self.mqtt.reconnect_max_secs {
            return invalid(
                "mqtt.reconnect_min_secs",
                "must not exceed mqtt.reconnect_max_secs",
            );
        }
        if self.synthesis.players.is_empty() {
            return invalid("synthesis.players", "needs at least one audio player");
        }
        // Also the relay worker's idle poll.
        if self.playback.poll_ms == 0 {
            return invalid("playback.poll_ms", "must be at least 1");
        }
        if self.playback.max_pending == Some(0) {
            return invalid("playback.max_pending", "must be at least 1 when set");
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/tts-mirror/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tts-mirror")
            .join("config.toml")
    }

    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.mqtt.host.clone(),
            port: self.mqtt.port,
            client_id: self.mqtt.client_id.clone(),
            keep_alive: Duration::from_secs(self.mqtt.keep_alive_secs),
            reconnect_min: Duration::from_secs(self.mqtt.reconnect_min_secs),
            reconnect_max: Duration::from_secs(self.mqtt.reconnect_max_secs),
            request_capacity: defaults::REQUEST_CAPACITY,
        }
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            mirror_topic: self.mqtt.mirror_topic.clone(),
            inbound_topic: Some(self.mqtt.inbound_topic.clone()),
            announce: self.mqtt.announce,
            startup_marker: defaults::STARTUP_MARKER.to_string(),
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            mirror_topic: self.mqtt.mirror_topic.clone(),
            max_chunk_size: self.relay.max_chunk_size,
            pacing: Duration::from_millis(self.relay.pacing_ms),
            reconnect_attempts: self.relay.reconnect_attempts,
            reconnect_poll: Duration::from_millis(self.relay.reconnect_poll_ms),
        }
    }

    pub fn piper_config(&self) -> PiperConfig {
        PiperConfig {
            binary: self.synthesis.piper_bin.clone(),
            model: self.synthesis.piper_model.clone(),
            config: self.synthesis.piper_config.clone(),
            players: self.synthesis.players.clone(),
            player_timeout: Duration::from_secs(self.synthesis.player_timeout_secs),
            synthesis_timeout: Duration::from_secs(self.synthesis.synthesis_timeout_secs),
        }
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            poll_interval: Duration::from_millis(self.playback.poll_ms),
            max_pending: self.playback.max_pending,
        }
    }

    /// `bind:port` for the monitor listener.
    pub fn monitor_addr(&self) -> String {
        format!("{}:{}", self.monitor.bind, self.monitor.port)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    let value = env_value(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(%key, %value, "Ignoring unparseable environment override");
            None
        }
    }
}
