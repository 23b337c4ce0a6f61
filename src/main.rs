//! Talktype - global push-to-talk speech-to-text
//!
//! Run with `talktype` or `talktype daemon` to start the daemon.
//! Use `talktype transcribe <file>` to test the pipeline on an audio file.

use clap::Parser;
use talktype::cli::{Cli, Commands};
use talktype::config::{self, HotkeyMode};
use talktype::daemon::{self, Daemon, TestOutcome};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("talktype={}", log_level))),
        )
        .init();

    let mut config = config::load_config(cli.config.as_deref())?;

    // CLI overrides (highest priority)
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(hotkey) = cli.hotkey {
        config.hotkey = hotkey;
    }
    if cli.hold {
        config.hotkey_mode = HotkeyMode::Hold;
    }

    match cli.command {
        None | Some(Commands::Daemon) => {
            Daemon::new(config).run().await?;
        }

        Some(Commands::Transcribe { file, deliver }) => {
            if let Some(path) = file {
                config.test_input_file = path.display().to_string();
            }
            match daemon::transcribe_file(&config, deliver).await? {
                TestOutcome::Text(text) => println!("{}", text),
                TestOutcome::Empty => eprintln!("(no speech detected)"),
                TestOutcome::Rejected { rms, threshold } => eprintln!(
                    "(rejected by sensitivity gate: rms {:.4} < threshold {:.4})",
                    rms, threshold
                ),
            }
        }

        Some(Commands::Devices) => {
            daemon::list_devices()?;
        }

        Some(Commands::Config { check }) => {
            println!("{}", toml::to_string_pretty(&config)?);
            if check {
                daemon::ping_server(&config.api_url);
            }
        }
    }

    Ok(())
}
