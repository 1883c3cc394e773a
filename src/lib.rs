//! hostwatch - live reachability and latency monitor
//!
//! This crate probes a set of hosts once per interval, either with ICMP echo
//! (through the system `ping`) or by timing TCP connects, and renders one
//! status line per host with summary statistics and a scrolling history.
//! It can be used as a library, or run as the `hostwatch` binary.
//!
//! # Architecture
//!
//! - **History**: bounded, lock-guarded ring of recent samples per host
//! - **Probe**: per-host polling task (ICMP or TCP)
//! - **Render**: status line and statistics over a host's history
//! - **Monitor**: spawns the probes, runs the render loop, handles shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use hostwatch::{Host, Monitor, ProbeSettings, TerminalScreen};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let interval = Duration::from_secs(1);
//!     let hosts = vec![Host::new("1.1.1.1", None, interval)];
//!     let mut monitor = Monitor::new(hosts, interval, ProbeSettings::default());
//!
//!     monitor.spawn_probes();
//!     let mut screen = TerminalScreen::enter()?;
//!     monitor.run(&mut screen).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod history;
pub mod monitor;
pub mod probe;
pub mod render;
pub mod terminal;

pub use config::{AppConfig, ConfigError};
pub use history::{ResultBuffer, Sample};
pub use monitor::{Monitor, Screen};
pub use probe::{Host, ProbeError, ProbeMode, ProbeSettings, Prober};
pub use terminal::TerminalScreen;
