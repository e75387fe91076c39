//! Journal Relay - stream Elite Dangerous journal events to live subscribers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use journal_relay::broker::EventBroker;
use journal_relay::commands::health::{fetch_health, format_health, DEFAULT_RELAY_URL};
use journal_relay::config::{ConfigLoader, RelayConfig, JOURNAL_PATH_ENV};
use journal_relay::journal::JournalPattern;
use journal_relay::monitor::MonitorController;
use journal_relay::web::{RelayServer, ServerConfig};

#[derive(Parser)]
#[command(
    name = "journal-relay",
    about = "Relay Elite Dangerous journal events to Server-Sent Events subscribers",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the journal directory and serve the event stream.
    Serve {
        /// Journal directory (overrides config and ELITE_JOURNAL_PATH).
        #[arg(short, long)]
        journal_dir: Option<PathBuf>,
        /// Host address to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Query a running relay's health endpoint.
    Health {
        /// Base URL of the relay.
        #[arg(long, default_value = DEFAULT_RELAY_URL)]
        url: String,
    },
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

fn load_config(path: Option<PathBuf>) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    Ok(loader.load()?)
}

async fn serve(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pattern = JournalPattern::new(&config.journal_pattern)?;
    let broker = EventBroker::new(config.broker_capacity);
    let monitor = Arc::new(MonitorController::new(
        broker,
        pattern,
        config.idle_interval(),
    ));

    tracing::info!(path = %config.journal_dir.display(), "Journal directory");
    match monitor.start(&config.journal_dir) {
        Ok(()) => {
            tracing::info!(url = %format!("http://localhost:{}/events", config.port), "SSE endpoint");
        }
        Err(e) => {
            // Keep serving so clients can connect once the path is fixed
            tracing::warn!(
                error = %e,
                "Monitoring not started; set {JOURNAL_PATH_ENV} to your journal directory"
            );
        }
    }

    let server = RelayServer::new(Arc::clone(&monitor)).with_config(ServerConfig::from(&config));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C");
        }
        shutdown.cancel();
    });

    server.run(cancel).await?;

    // No-op if the server already stopped it during shutdown
    tokio::task::spawn_blocking(move || monitor.stop()).await??;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Serve {
            journal_dir,
            host,
            port,
        } => match load_config(cli.config) {
            Ok(mut config) => {
                if let Some(dir) = journal_dir {
                    config.journal_dir = dir;
                }
                if let Some(host) = host {
                    config.host = host;
                }
                if let Some(port) = port {
                    config.port = port;
                }
                serve(config).await
            }
            Err(e) => Err(e),
        },
        Commands::Health { url } => match fetch_health(&url).await {
            Ok(health) => {
                println!("{}", format_health(&health));
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "journal-relay failed");
            ExitCode::FAILURE
        }
    }
}
