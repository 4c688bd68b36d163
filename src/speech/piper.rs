//! Piper synthesis to a temporary WAV file, played with the first working
//! audio player.

use crate::defaults;
use crate::error::{MirrorError, Result};
use crate::speech::Speaker;
use crate::speech::command::{CommandRunner, SystemCommandRunner};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Synthesizer and player settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PiperConfig {
    pub binary: PathBuf,
    pub model: PathBuf,
    /// Voice config passed as `--config` when present.
    pub config: Option<PathBuf>,
    /// Audio players tried in order, each called as `player <wav>`.
    pub players: Vec<String>,
    pub player_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(defaults::PIPER_BIN),
            model: PathBuf::from(defaults::PIPER_MODEL),
            config: Some(PathBuf::from(defaults::PIPER_CONF)),
            players: defaults::AUDIO_PLAYERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            player_timeout: Duration::from_secs(defaults::PLAYER_TIMEOUT_SECS),
            synthesis_timeout: Duration::from_secs(defaults::SYNTHESIS_TIMEOUT_SECS),
        }
    }
}

/// Speaker backed by the piper CLI.
pub struct PiperSpeaker<R: CommandRunner = SystemCommandRunner> {
    config: PiperConfig,
    runner: R,
}

impl PiperSpeaker<SystemCommandRunner> {
    pub fn new(config: PiperConfig) -> Self {
        Self::with_runner(config, SystemCommandRunner::new())
    }
}

impl<R: CommandRunner> PiperSpeaker<R> {
    pub fn with_runner(config: PiperConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &PiperConfig {
        &self.config
    }

    fn check_installation(&self) -> Result<()> {
        if !self.config.binary.exists() {
            return Err(MirrorError::SynthesizerNotFound {
                path: self.config.binary.display().to_string(),
            });
        }
        if !self.config.model.exists() {
            return Err(MirrorError::ModelNotFound {
                path: self.config.model.display().to_string(),
            });
        }
        Ok(())
    }

    fn synthesize(&self, text: &str, wav: &str) -> Result<()> {
        let binary = self.config.binary.display().to_string();
        let model = self.config.model.display().to_string();
        let voice_config = self
            .config
            .config
            .as_ref()
            .filter(|path| path.exists())
            .map(|path| path.display().to_string());

        let mut args = vec!["--model", model.as_str(), "--output_file", wav];
        if let Some(voice_config) = voice_config.as_deref() {
            args.push("--config");
            args.push(voice_config);
        }

        self.runner
            .run(
                &binary,
                &args,
                Some(text),
                Some(self.config.synthesis_timeout),
            )
            .map_err(|e| match e {
                MirrorError::CommandFailed { stderr, status, .. } => {
                    MirrorError::SynthesisFailed {
                        message: if stderr.is_empty() { status } else { stderr },
                    }
                }
                MirrorError::CommandNotFound { program } => {
                    MirrorError::SynthesizerNotFound { path: program }
                }
                other => other,
            })?;
        Ok(())
    }

    fn play(&self, wav: &str) -> Result<()> {
        for player in &self.config.players {
            match self
                .runner
                .run(player, &[wav], None, Some(self.config.player_timeout))
            {
                Ok(_) => {
                    debug!(player = %player, "Playback finished");
                    return Ok(());
                }
                Err(e) => {
                    debug!(player = %player, error = %e, "Audio player failed, trying next");
                }
            }
        }
        Err(MirrorError::NoAudioOutput {
            tried: self.config.players.join(", "),
        })
    }
}

impl<R: CommandRunner> Speaker for PiperSpeaker<R> {
    fn speak(&self, text: &str) -> Result<()> {
        self.check_installation()?;

        // Removed when dropped, whichever way this returns.
        let wav = tempfile::Builder::new()
            .prefix("tts-mirror-")
            .suffix(".wav")
            .tempfile()?;
        let wav_path = wav.path().display().to_string();

        debug!(text = %defaults::preview(text), "Synthesizing");
        self.synthesize(text, &wav_path)?;

        let size = std::fs::metadata(wav.path())?.len();
        if size == 0 {
            warn!("Synthesizer wrote an empty file");
            return Err(MirrorError::EmptyAudio);
        }

        self.play(&wav_path)?;
        info!(text = %defaults::preview(text), "Spoken");
        Ok(())
    }

    fn name(&self) -> &str {
        "piper"
    }
}
