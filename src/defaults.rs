//! Default configuration constants for tts-mirror.
//!
//! Shared by the configuration types and the components that fall back to
//! them, so every default lives in exactly one place.

/// Broker host.
pub const MQTT_HOST: &str = "localhost";

/// Broker port (plain MQTT).
pub const MQTT_PORT: u16 = 1883;

/// Client identifier presented to the broker.
pub const MQTT_CLIENT_ID: &str = "moxie_tts_mirror";

/// MQTT keep-alive interval in seconds.
pub const KEEP_ALIVE_SECS: u64 = 60;

/// Topic carrying the device's internal TTS text.
pub const INBOUND_TOPIC: &str = "moxie/internal/tts";

/// Topic external observers subscribe to.
pub const MIRROR_TOPIC: &str = "moxie/tts/text";

/// Sentinel published on the mirror topic once the relay is online.
pub const STARTUP_MARKER: &str = "OK ES-MQTT";

/// Lower bound of the reconnect backoff, in seconds.
pub const RECONNECT_MIN_SECS: u64 = 1;

/// Upper bound of the reconnect backoff, in seconds.
pub const RECONNECT_MAX_SECS: u64 = 120;

/// Capacity of the transport's outbound request queue.
pub const REQUEST_CAPACITY: usize = 64;

/// Maximum characters per mirrored message.
pub const MAX_CHUNK_SIZE: usize = 400;

/// Pause between consecutive chunks of one utterance, in milliseconds.
pub const CHUNK_PACING_MS: u64 = 50;

/// How many times the relay polls for a connection before publishing anyway.
pub const RECONNECT_ATTEMPTS: u32 = 10;

/// Interval between those polls, in milliseconds.
pub const RECONNECT_POLL_MS: u64 = 100;

/// Piper binary location.
pub const PIPER_BIN: &str = "/usr/local/bin/piper";

/// Piper voice model.
pub const PIPER_MODEL: &str = "/usr/local/share/piper/es_ES-vera-medium.onnx";

/// Piper voice model configuration.
pub const PIPER_CONF: &str = "/usr/local/share/piper/es_ES-vera-medium.onnx.json";

/// Audio output programs, tried in order.
pub const AUDIO_PLAYERS: &[&str] = &["paplay", "aplay"];

/// Upper bound for a single audio output attempt, in seconds.
pub const PLAYER_TIMEOUT_SECS: u64 = 30;

/// Upper bound for a single synthesis run, in seconds.
pub const SYNTHESIS_TIMEOUT_SECS: u64 = 120;

/// How long the playback worker blocks on an empty queue before
/// re-checking for shutdown, in milliseconds.
pub const PLAYBACK_POLL_MS: u64 = 1000;

/// Address the HTTP monitor binds to.
pub const MONITOR_BIND: &str = "0.0.0.0";

/// Port of the HTTP monitor.
pub const MONITOR_PORT: u16 = 8787;

/// Number of received utterances the monitor keeps.
pub const HISTORY_LIMIT: usize = 50;

/// Characters of an utterance shown in log lines.
pub const LOG_PREVIEW_CHARS: usize = 50;

/// Truncate `text` to [`LOG_PREVIEW_CHARS`] characters for logging.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(LOG_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("Hola"), "Hola");
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let text = "x".repeat(80);
        let shown = preview(&text);
        assert_eq!(shown, format!("{}...", "x".repeat(LOG_PREVIEW_CHARS)));
    }

    #[test]
    fn test_preview_respects_multibyte_characters() {
        let text = "ñ".repeat(LOG_PREVIEW_CHARS + 1);
        let shown = preview(&text);
        assert!(shown.starts_with(&"ñ".repeat(LOG_PREVIEW_CHARS)));
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn test_reconnect_bounds_are_ordered() {
        assert!(RECONNECT_MIN_SECS <= RECONNECT_MAX_SECS);
    }
}
