//! Core probe traits and types.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::probe::Host;
use crate::probe::icmp::IcmpProbe;
use crate::probe::tcp::TcpProbe;

/// Minimum allowed probe interval (100 milliseconds).
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Echo program used for ICMP probes unless configured otherwise.
pub const DEFAULT_PING_COMMAND: &str = "ping";

/// Failures that end a probe for good.
///
/// The `Display` text of each variant is what the host shows in place of its
/// statistics once the probe has stopped.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The address could not be mapped to a socket address.
    #[error("host resolution failed")]
    Resolution,

    /// The echo process exited on its own.
    #[error("process died")]
    ProcessDied,

    /// The echo process reported an error and then exited.
    #[error("ping error: {0}")]
    Process(String),

    /// Any other I/O failure inside the probe loop.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Probe variant, chosen by whether a TCP port was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// ICMP echo through an external process.
    Icmp,
    /// TCP connect timing against the given port.
    Tcp(u16),
}

impl ProbeMode {
    pub fn for_port(port: Option<u16>) -> Self {
        port.map_or(Self::Icmp, Self::Tcp)
    }
}

impl std::fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Icmp => write!(f, "icmp"),
            Self::Tcp(port) => write!(f, "tcp/{}", port),
        }
    }
}

/// Settings shared by every probe of one run.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Echo command line: program followed by any fixed leading arguments.
    pub ping_command: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ping_command: DEFAULT_PING_COMMAND.to_string(),
        }
    }
}

/// Core probe trait.
///
/// # Error Handling Philosophy
///
/// A missed reply is an observation, not an error: the probe records
/// [`Sample::Lost`](crate::history::Sample::Lost) and keeps going. `run`
/// returns `Err` only for failures that make further probing pointless, and
/// the caller turns that error into the host's permanent status.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Short name for logs.
    fn kind(&self) -> &'static str;

    /// Probe `host` once per interval until `shutdown` fires.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: stopped because of shutdown
    /// - `Err(ProbeError)`: stopped because of a terminal failure
    async fn run(&self, host: &Host, shutdown: &CancellationToken) -> Result<(), ProbeError>;
}

/// Build the prober matching the host's mode.
pub fn prober_for(host: &Host, settings: &ProbeSettings) -> Box<dyn Prober> {
    match host.mode() {
        ProbeMode::Icmp => Box::new(IcmpProbe::new(&settings.ping_command)),
        ProbeMode::Tcp(port) => Box::new(TcpProbe::new(port)),
    }
}

/// Resolve `address` to the first socket address the resolver returns.
pub(crate) async fn resolve(address: &str, port: u16) -> Result<SocketAddr, ProbeError> {
    let mut addrs = tokio::net::lookup_host((address, port))
        .await
        .map_err(|e| {
            tracing::warn!(host = %address, error = %e, "Failed to resolve hostname");
            ProbeError::Resolution
        })?;

    addrs.next().ok_or_else(|| {
        tracing::warn!(host = %address, "Resolver returned no addresses");
        ProbeError::Resolution
    })
}

/// Sleep for `duration` unless shutdown fires first.
///
/// Returns `false` when the wait was cut short by shutdown.
pub(crate) async fn wait_tick(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
