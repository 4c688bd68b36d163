//! Speech synthesis and local audio output.

pub mod command;
pub mod mock;
pub mod piper;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use mock::MockSpeaker;
pub use piper::{PiperConfig, PiperSpeaker};

use crate::error::Result;

/// Turns text into audible speech.
///
/// `speak` blocks until playback has finished or failed. Implementations
/// must be Send + Sync so the playback worker can own them.
pub trait Speaker: Send + Sync {
    /// Synthesize `text` and play it to completion.
    fn speak(&self, text: &str) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "speaker"
    }
}
