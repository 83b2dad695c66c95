//! Tailhook - tail a log file and forward pattern matches to a webhook.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tailhook::config::{ConfigLoader, WatchSettings};
use tailhook::delivery::Backoff;
use tailhook::shutdown::Shutdown;
use tailhook::Error;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackoffArg {
    Fixed,
    Exponential,
}

impl From<BackoffArg> for Backoff {
    fn from(arg: BackoffArg) -> Self {
        match arg {
            BackoffArg::Fixed => Backoff::Fixed,
            BackoffArg::Exponential => Backoff::Exponential,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "tailhook",
    about = "Tail a log file and POST matching lines to a webhook",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (default: ./.tailhook.toml, then the user config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file to watch.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Regex pattern to match.
    #[arg(short, long)]
    pattern: Option<String>,

    /// Webhook URL.
    #[arg(short, long)]
    webhook: Option<String>,

    /// Retries after a failed delivery attempt [default: 3].
    #[arg(long)]
    retries: Option<u32>,

    /// Minimum delay between delivery attempts, in milliseconds [default: 5000].
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Delay growth between retries [default: fixed].
    #[arg(long, value_enum)]
    backoff: Option<BackoffArg>,

    /// Pause before reopening a rotated file, in milliseconds [default: 100].
    #[arg(long)]
    rotation_grace_ms: Option<u64>,

    /// Coalesce filesystem events within this window, in milliseconds; 0 disables.
    #[arg(long)]
    debounce_ms: Option<u64>,
}

impl Cli {
    /// Command-line flags take precedence over file settings.
    fn apply(&self, settings: &mut WatchSettings) {
        if let Some(file) = &self.file {
            settings.file = Some(file.clone());
        }
        if let Some(pattern) = &self.pattern {
            settings.pattern = Some(pattern.clone());
        }
        if let Some(webhook) = &self.webhook {
            settings.webhook = Some(webhook.clone());
        }
        if let Some(retries) = self.retries {
            settings.max_retries = retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            settings.retry_delay_ms = delay;
        }
        if let Some(backoff) = self.backoff {
            settings.backoff = backoff.into();
        }
        if let Some(grace) = self.rotation_grace_ms {
            settings.rotation_grace_ms = grace;
        }
        if let Some(debounce) = self.debounce_ms {
            settings.debounce_ms = debounce;
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), Error> {
    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut settings = loader.load()?;
    cli.apply(&mut settings);
    let config = settings.resolve()?;

    tracing::info!(
        file = %config.target_path.display(),
        pattern = %config.pattern,
        webhook = %config.webhook_url,
        "Starting tailhook"
    );

    let mut shutdown = Shutdown::new();
    shutdown.listen().map_err(Error::Signal)?;

    let mut orchestrator = tailhook::pipeline::start(&config, &shutdown.token()).await?;
    orchestrator.run().await;

    shutdown.teardown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Setup failed");
            ExitCode::FAILURE
        }
    }
}
