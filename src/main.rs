//! hostwatch binary entry point.
//!
//! Parses arguments, takes over the terminal and runs the monitor until all
//! probes stop or the process is interrupted. Core functionality is provided
//! by the `hostwatch` library crate.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use hostwatch::{
    config::{AppConfig, parse_interval},
    monitor::{Monitor, Screen},
    probe::ProbeMode,
    terminal::TerminalScreen,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// hostwatch - live ICMP/TCP reachability monitor
#[derive(Parser, Debug)]
#[command(name = "hostwatch", version, about, long_about = None)]
struct Cli {
    /// Hosts to monitor (hostnames or IP addresses)
    hosts: Vec<String>,

    /// Probe interval in seconds, or a duration such as "500ms"
    #[arg(short, long, value_parser = parse_interval)]
    interval: Option<Duration>,

    /// Probe this TCP port instead of using ICMP echo
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Path to a YAML configuration file
    #[arg(short, long, env = "HOSTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Echo command used for ICMP probes (overrides config file)
    #[arg(long, env = "HOSTWATCH_PING")]
    ping_command: Option<String>,

    /// Write logs to this file (the terminal is used by the live view)
    #[arg(long, env = "HOSTWATCH_LOG")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Merge arguments over the config file (CLI > ENV > config file).
    fn into_config(self) -> Result<AppConfig, hostwatch::ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                AppConfig::load(path)?
            }
            None => AppConfig::default(),
        };

        if !self.hosts.is_empty() {
            config.hosts = self.hosts;
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if let Some(command) = self.ping_command {
            config.ping_command = command;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = cli.into_config()?;
    tracing::info!(
        "Monitoring {} hosts every {:?} ({})",
        config.hosts.len(),
        config.interval,
        ProbeMode::for_port(config.port),
    );

    let mut monitor = Monitor::new(
        config.build_hosts(),
        config.interval,
        config.probe_settings(),
    );
    tokio::spawn(shutdown_signal(monitor.shutdown_token()));
    monitor.spawn_probes();

    let mut screen = TerminalScreen::enter()?;
    let result = monitor.run(&mut screen).await;
    let size = screen.size();
    screen.leave()?;

    tracing::info!("Shutting down probes...");
    for line in monitor.shutdown(size).await {
        println!("{}", line);
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Install a file logger when `path` is given; otherwise logging stays off.
fn init_tracing(path: Option<&Path>) -> std::io::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hostwatch=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        () = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    token.cancel();
}
