use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tts_mirror::cli::{Cli, Commands, ConfigAction, log_filter};
use tts_mirror::config::Config;
use tts_mirror::connection::{ConnectionManager, StartupAnnouncement};
use tts_mirror::daemon::run_daemon;
use tts_mirror::relay::{OrderedRelay, RelayOutcome};
use tts_mirror::speech::{PiperSpeaker, Speaker};
use tts_mirror::transport::MqttTransport;

/// Polls while waiting for the broker in one-shot commands.
const ONE_SHOT_CONNECT_ATTEMPTS: u32 = 50;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter(cli.quiet, cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            run(config).await?;
        }
        Some(Commands::Run {
            no_playback,
            no_monitor,
        }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if no_playback {
                config.playback.enabled = false;
            }
            if no_monitor {
                config.monitor.enabled = false;
            }
            run(config).await?;
        }
        Some(Commands::Relay { text }) => {
            let config = load_config(cli.config.as_deref())?;
            config.validate()?;
            let outcome = tokio::task::spawn_blocking(move || relay_once(&config, &text))
                .await
                .context("relay task failed")?;
            match outcome {
                RelayOutcome::Delivered { chunks } => println!("Mirrored in {} chunk(s)", chunks),
                RelayOutcome::Skipped => println!("Nothing to relay"),
                RelayOutcome::Partial { published, total } => {
                    bail!("only {} of {} chunks were published", published, total)
                }
            }
        }
        Some(Commands::Say { text }) => {
            let config = load_config(cli.config.as_deref())?;
            let speaker = PiperSpeaker::new(config.piper_config());
            tokio::task::spawn_blocking(move || speaker.speak(&text))
                .await
                .context("playback task failed")??;
        }
        Some(Commands::Chunk { text, max_size }) => {
            let max_size = match max_size {
                Some(size) => size,
                None => load_config(cli.config.as_deref())?.relay.max_chunk_size,
            };
            if max_size == 0 {
                bail!("--max-size must be at least 1");
            }
            for piece in tts_mirror::chunk(&text, max_size) {
                println!("{}", piece);
            }
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "tts-mirror", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load config from the given path, or the default path with fallback to
/// defaults, then apply environment overrides.
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

async fn run(config: Config) -> Result<()> {
    info!(version = %tts_mirror::version_string(), "tts-mirror starting");
    run_daemon(config).await?;
    Ok(())
}

/// Connect, relay `text` once and disconnect. No startup marker is sent.
fn relay_once(config: &Config, text: &str) -> RelayOutcome {
    let mut settings = config.connection_settings();
    settings.inbound_topic = None;
    settings.announce = StartupAnnouncement::Never;

    let transport = Arc::new(MqttTransport::new(config.mqtt_settings()));
    let connection = Arc::new(ConnectionManager::new(transport, settings));
    let relay_settings = config.relay_settings();

    connection.connect();
    connection.wait_until_connected(ONE_SHOT_CONNECT_ATTEMPTS, relay_settings.reconnect_poll);

    let relay = OrderedRelay::new(Arc::clone(&connection), relay_settings);
    let outcome = relay.relay(text);
    connection.close();
    outcome
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&std::path::Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
            if let Err(e) = config.validate() {
                eprintln!("warning: {}", e);
            }
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(std::path::PathBuf::from)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
