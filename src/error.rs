//! Error types for tts-mirror.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Broker connectivity errors
    #[error("Not connected to broker")]
    NotConnected,

    #[error("Failed to connect to broker: {message}")]
    ConnectFailed { message: String },

    #[error("Publish failed: {message}")]
    PublishFailed { message: String },

    #[error("Subscribe to {topic} failed: {message}")]
    SubscribeFailed { topic: String, message: String },

    #[error("Connection has been closed")]
    TransportClosed,

    // Synthesis and playback errors
    #[error("Synthesizer binary not found at {path}")]
    SynthesizerNotFound { path: String },

    #[error("Synthesis model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Synthesis failed: {message}")]
    SynthesisFailed { message: String },

    #[error("Synthesizer produced no audio")]
    EmptyAudio,

    #[error("No audio output program succeeded (tried: {tried})")]
    NoAudioOutput { tried: String },

    // External command errors
    #[error("Command not found: {program}")]
    CommandNotFound { program: String },

    #[error("{program} failed with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    CommandTimedOut { program: String, timeout: Duration },

    // Monitor errors
    #[error("Monitor server error: {message}")]
    Monitor { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, MirrorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = MirrorError::ConfigInvalidValue {
            key: "relay.max_chunk_size".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for relay.max_chunk_size: must be positive"
        );
    }

    #[test]
    fn test_publish_failed_display() {
        let error = MirrorError::PublishFailed {
            message: "request channel full".to_string(),
        };
        assert_eq!(error.to_string(), "Publish failed: request channel full");
    }

    #[test]
    fn test_command_failed_display() {
        let error = MirrorError::CommandFailed {
            program: "piper".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "model load error".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "piper failed with status exit status: 1: model load error"
        );
    }

    #[test]
    fn test_command_timed_out_display() {
        let error = MirrorError::CommandTimedOut {
            program: "aplay".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(error.to_string(), "aplay timed out after 30s");
    }

    #[test]
    fn test_no_audio_output_display() {
        let error = MirrorError::NoAudioOutput {
            tried: "paplay, aplay".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No audio output program succeeded (tried: paplay, aplay)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: MirrorError = io_error.into();
        assert!(matches!(error, MirrorError::Io(_)));
        assert!(error.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_error() -> Result<()> {
            Err(MirrorError::Other("boom".to_string()))
        }
        assert_eq!(returns_error().unwrap_err().to_string(), "boom");
    }
}
