//! Probe Layer
//!
//! Per-host polling that turns reachability checks into history samples.
//! Every host runs exactly one probe in its own Tokio task until either the
//! shared shutdown token fires or the probe hits a terminal failure.
//!
//! # Architecture
//!
//! - [`Host`]: one monitored target, owning its history and terminal status
//! - [`Prober`]: core trait implemented by the probe variants
//! - [`icmp::IcmpProbe`]: drives an external `ping` process
//! - [`tcp::TcpProbe`]: times TCP connects to a port
//!
//! # Example
//!
//! ```rust,no_run
//! use hostwatch::probe::{Host, ProbeSettings, prober_for};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let host = Host::new("127.0.0.1", Some(6379), Duration::from_secs(1));
//! let prober = prober_for(&host, &ProbeSettings::default());
//! let shutdown = CancellationToken::new();
//! host.run_probe(prober.as_ref(), &shutdown).await;
//! # }
//! ```

mod host;
pub mod icmp;
pub mod tcp;
mod traits;

pub use host::Host;
pub use traits::{
    DEFAULT_PING_COMMAND, MIN_INTERVAL, ProbeError, ProbeMode, ProbeSettings, Prober, prober_for,
};
pub(crate) use traits::{resolve, wait_tick};
