//! tts-mirror - ordered MQTT mirror of a device's TTS stream
//!
//! Receives utterances on an inbound topic, republishes them in bounded,
//! ordered chunks on a mirror topic and speaks them locally through a
//! single playback worker.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod chunker;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod connection;
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod monitor;
pub mod playback;
pub mod relay;
pub mod speech;
pub mod transport;
pub mod utterance;

#[cfg(test)]
mod proptests;

// Core pipeline (receive → relay / play)
pub use chunker::chunk;
pub use connection::{ConnectionManager, ConnectionSettings, ConnectionState, InboundSink};
pub use playback::{PlaybackHandle, PlaybackQueue, PlaybackWorker};
pub use relay::{OrderedRelay, RelayOutcome, RelaySettings};
pub use utterance::Utterance;

// Collaborators
pub use speech::{PiperSpeaker, Speaker};
pub use transport::{MqttTransport, QoS, Transport, TransportEvents};

// Error handling
pub use error::{MirrorError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_only_when_built_from_git() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(ver.contains('+'), "expected '+<hash>', got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
