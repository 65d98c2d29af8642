//! away-responder - auto-reply daemon for direct messages from contacts.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation
//! - 10/16/2026 - `stop` waits for the daemon to exit and leaves the pid file to it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use away_responder::config::Config;
use away_responder::daemon::pidfile::{self, StopOutcome};
use away_responder::daemon::{self, runner, shutdown};
use away_responder::gateway::bridge::BridgeGateway;
use away_responder::logging;

/// Auto-reply to direct messages from known contacts, once per cooldown.
#[derive(Parser, Debug)]
#[command(name = "away-responder")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: $AWAY_RESPONDER_CONFIG, ./config.toml, ./config.yaml, or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Fork into the background (also enabled by `enable_daemon_mode`)
        #[arg(long, conflicts_with = "foreground")]
        daemon: bool,

        /// Stay in the foreground even if `enable_daemon_mode` is set
        #[arg(long)]
        foreground: bool,
    },

    /// Stop a background daemon
    Stop,

    /// Check whether the daemon is running
    Status,

    /// Validate the configuration and print the effective settings
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Command::Start { daemon, foreground } => cmd_start(config_path, daemon, foreground),
        Command::Stop => cmd_stop(config_path),
        Command::Status => cmd_status(config_path),
        Command::CheckConfig => cmd_check_config(config_path),
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn load_validated(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    let (config, path) = Config::load(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration ({:?})", path))?;
    Ok((config, path))
}

fn cmd_start(config_path: Option<&Path>, daemon: bool, foreground: bool) -> Result<()> {
    let (config, path) = load_validated(config_path)?;
    let background = !foreground && (daemon || config.enable_daemon_mode);

    if background {
        use daemonize::Daemonize;

        let pid_file = config.pid_path();
        if let Some(parent) = pid_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        if config.log_path().is_none() {
            eprintln!("warning: no log_file configured, background output will be discarded");
        }

        // Keep the working directory so relative paths in the config still resolve.
        Daemonize::new()
            .pid_file(&pid_file)
            .working_directory(std::env::current_dir()?)
            .start()
            .context("Failed to daemonize")?;
    }

    logging::init(&config.log_level, config.log_path().as_deref())?;
    info!(config = ?path, background, "starting away-responder");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(serve(&config));
    // A login-code prompt may still be blocked on stdin.
    runtime.shutdown_timeout(Duration::from_secs(1));

    if background {
        let _ = std::fs::remove_file(config.pid_path());
    }
    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "away-responder failed");
    }
    result
}

async fn serve(config: &Config) -> Result<()> {
    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        match runner::wait_for_signal().await {
            Ok(()) => {
                info!("signal received, shutting down");
                trigger.trigger();
            }
            Err(e) => error!(error = %e, "failed to install signal handlers"),
        }
    });

    let gateway = Arc::new(BridgeGateway::new(
        config.bridge_socket_path(),
        config.request_timeout(),
    ));
    info!(socket = ?gateway.socket_path(), "using messaging bridge");

    let stats = daemon::run(config, gateway, shutdown).await?;
    info!(?stats, "away-responder stopped");
    Ok(())
}

/// How long `stop` waits for the daemon to drain and exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

fn cmd_stop(config_path: Option<&Path>) -> Result<()> {
    let (config, _) = Config::load(config_path)?;

    match pidfile::stop(&config.pid_path(), STOP_TIMEOUT)? {
        StopOutcome::Stopped { pid } => println!("Daemon stopped (pid {})", pid),
        StopOutcome::Stale { pid } => {
            println!("Daemon not running (removed stale pid file for pid {})", pid)
        }
    }

    Ok(())
}

fn cmd_status(config_path: Option<&Path>) -> Result<()> {
    let (config, _) = Config::load(config_path)?;

    match pidfile::read_pid(&config.pid_path()) {
        Ok(pid) if pidfile::process_alive(pid) => {
            println!("Daemon running (pid {})", pid);
            Ok(())
        }
        _ => {
            println!("Daemon not running");
            std::process::exit(1);
        }
    }
}

fn cmd_check_config(config_path: Option<&Path>) -> Result<()> {
    let (config, path) = load_validated(config_path)?;

    let summary = serde_json::json!({
        "config_file": path,
        "config_file_found": path.exists(),
        "settings": config.redacted(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
