//! Playback worker driving the Piper speaker through a scripted runner.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tts_mirror::error::{MirrorError, Result};
use tts_mirror::playback::{PlaybackConfig, PlaybackWorker};
use tts_mirror::speech::{CommandOutput, CommandRunner, MockSpeaker, PiperConfig, PiperSpeaker};

/// Fails synthesis for one text with a non-zero exit and records every
/// text that reached the player.
struct FakePiper {
    fail_text: &'static str,
    synthesized: Arc<Mutex<Vec<String>>>,
    played: Arc<Mutex<usize>>,
}

impl CommandRunner for FakePiper {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
        _timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        if program.ends_with("piper") {
            let text = stdin.unwrap_or_default().to_string();
            self.synthesized.lock().unwrap().push(text.clone());
            if text == self.fail_text {
                return Err(MirrorError::CommandFailed {
                    program: program.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "synthesis crashed".to_string(),
                });
            }
            let out = args
                .iter()
                .position(|a| *a == "--output_file")
                .map(|i| args[i + 1])
                .unwrap();
            std::fs::write(out, b"RIFF....WAVE").unwrap();
        } else {
            *self.played.lock().unwrap() += 1;
        }
        Ok(CommandOutput::default())
    }
}

fn installed_piper(dir: &TempDir) -> PiperConfig {
    let binary = dir.path().join("piper");
    let model = dir.path().join("voice.onnx");
    std::fs::write(&binary, b"").unwrap();
    std::fs::write(&model, b"").unwrap();
    PiperConfig {
        binary,
        model,
        config: None,
        players: vec!["aplay".to_string()],
        ..PiperConfig::default()
    }
}

fn fast_worker() -> PlaybackWorker {
    PlaybackWorker::new(PlaybackConfig {
        poll_interval: Duration::from_millis(10),
        max_pending: None,
    })
}

fn wait_for(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn synthesis_failure_does_not_block_later_items() {
    let dir = TempDir::new().unwrap();
    let synthesized = Arc::new(Mutex::new(Vec::new()));
    let played = Arc::new(Mutex::new(0));
    let speaker = PiperSpeaker::with_runner(
        installed_piper(&dir),
        FakePiper {
            fail_text: "a",
            synthesized: synthesized.clone(),
            played: played.clone(),
        },
    );

    let handle = fast_worker().start(Arc::new(speaker)).unwrap();
    for text in ["a", "b", "c"] {
        assert!(handle.enqueue(text));
    }

    wait_for(|| *played.lock().unwrap() == 2);

    assert_eq!(*synthesized.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(*played.lock().unwrap(), 2);
    handle.stop();
}

#[test]
fn items_play_in_order_one_at_a_time() {
    let speaker = Arc::new(MockSpeaker::new().with_delay(Duration::from_millis(15)));
    let handle = fast_worker().start(speaker.clone()).unwrap();
    let state = handle.state();

    let texts: Vec<String> = (0..6).map(|i| format!("frase {}", i)).collect();
    for text in &texts {
        handle.enqueue(text);
    }

    wait_for(|| state.is_playing());
    assert!(handle.is_playing());

    wait_for(|| speaker.spoken().len() == texts.len());
    assert_eq!(speaker.spoken(), texts);
    assert_eq!(speaker.max_concurrency(), 1);
    handle.stop();
}

#[test]
fn enqueue_never_blocks_on_slow_playback() {
    let speaker = Arc::new(MockSpeaker::new().with_delay(Duration::from_millis(200)));
    let handle = fast_worker().start(speaker.clone()).unwrap();

    let start = Instant::now();
    for i in 0..50 {
        assert!(handle.enqueue(&format!("mensaje {}", i)));
    }
    assert!(start.elapsed() < Duration::from_millis(100));
    assert!(handle.pending() > 0);

    handle.stop();
}
