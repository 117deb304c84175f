use std::{
    env, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::{config::load_file_config, RelayConfig, Transport};
use relay_server::{
    slack::SlackTransport,
    transport::{determine_transport, LineTransport, TransportKind},
    CommandRouter, RelayServer,
};
use relay_tools::{default_mention_handlers, default_slash_handlers, fallback_handler, HandlerDeps};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG_FILE: &str = "relay.toml";
const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Parser, Debug)]
#[command(name = "relayd", version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Path to the TOML configuration (defaults to ./relay.toml when present)
    #[arg(long = "config", value_name = "FILE")]
    config_path: Option<PathBuf>,

    /// Dotenv file loaded before reading the environment
    #[arg(long = "env-file", value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Optional log filter (e.g. info, debug)
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Transport backend (slack | stdio)
    #[arg(long = "transport", value_name = "TYPE")]
    transport: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args);
    info!("relayd {}", SERVER_VERSION);

    load_env_file(args.env_file.as_deref())?;

    let config_path = args
        .config_path
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)));
    let file_config = load_file_config(config_path.as_deref())?;
    let config = RelayConfig::resolve(file_config.as_ref(), |name| env::var(name).ok())?;
    info!(
        allow_list = config.allow_list.len(),
        exec_timeout_secs = config.exec_timeout.as_secs(),
        restart = config.restart.is_some(),
        "configuration resolved"
    );

    let env_transport = env::var("RELAY_TRANSPORT").ok();
    let kind = determine_transport(args.transport.as_deref(), env_transport.as_deref())?;
    let transport: Arc<dyn Transport> = match kind {
        TransportKind::Slack => Arc::new(SlackTransport::new(config.slack_credentials()?.clone())),
        TransportKind::Stdio => Arc::new(LineTransport::stdio()),
    };

    let deps = HandlerDeps::from_config(&config)?;
    let router = CommandRouter::new(
        default_mention_handlers(&config, &deps),
        fallback_handler(&config),
        default_slash_handlers(),
        config.allow_list.clone(),
    );
    let server = Arc::new(RelayServer::new(router, transport));

    let shutdown = CancellationToken::new();
    spawn_signal_handlers(shutdown.clone());

    server.serve(shutdown).await?;
    info!("relayd stopped");
    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    let _ = builder.try_init();
}

/// An explicit env file must exist; the default `.env` is optional.
fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => match dotenvy::from_path(DEFAULT_ENV_FILE) {
            Ok(()) => {}
            Err(err) if err.not_found() => {}
            Err(err) => warn!("Ignoring {}: {}", DEFAULT_ENV_FILE, err),
        },
    }
    Ok(())
}

fn spawn_signal_handlers(shutdown: CancellationToken) {
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C; shutting down relay");
            ctrl_c_token.cancel();
        }
    });

    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                return;
            }
        };
        tokio::spawn(async move {
            if sigterm.recv().await.is_some() {
                info!("Received SIGTERM; shutting down relay");
                shutdown.cancel();
            }
        });
    }
}
