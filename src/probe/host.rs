//! A single monitored target.

use std::sync::OnceLock;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::history::{DEFAULT_HISTORY, ResultBuffer, Sample};
use crate::probe::{MIN_INTERVAL, ProbeMode, Prober};
use crate::render;

/// One monitored host.
///
/// Written only by its own probe task and read by the render loop. The
/// history has its own lock; the terminal status can be set exactly once.
#[derive(Debug)]
pub struct Host {
    address: String,
    port: Option<u16>,
    label: String,
    interval: Duration,
    history: ResultBuffer,
    status: OnceLock<String>,
}

impl Host {
    /// Create a host. The interval is clamped to [`MIN_INTERVAL`].
    pub fn new(address: impl Into<String>, port: Option<u16>, interval: Duration) -> Self {
        let address = address.into();
        let interval = if interval < MIN_INTERVAL {
            tracing::warn!(host = %address, min_interval = ?MIN_INTERVAL,
                "Interval is less than minimum allowed. Using minimum interval."
            );
            MIN_INTERVAL
        } else {
            interval
        };
        let label = match port {
            Some(port) => format!("{}:{}", address, port),
            None => address.clone(),
        };

        Self {
            address,
            port,
            label,
            interval,
            history: ResultBuffer::new(DEFAULT_HISTORY),
            status: OnceLock::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Display name: the address, plus `:port` in TCP mode.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Interval in milliseconds, the unit samples are recorded in.
    pub fn interval_ms(&self) -> f64 {
        self.interval.as_secs_f64() * 1000.0
    }

    pub fn mode(&self) -> ProbeMode {
        ProbeMode::for_port(self.port)
    }

    pub fn history(&self) -> &ResultBuffer {
        &self.history
    }

    /// Terminal status, once the probe has failed for good.
    pub fn status(&self) -> Option<&str> {
        self.status.get().map(String::as_str)
    }

    /// Record one tick's outcome.
    pub fn record(&self, sample: Sample) {
        tracing::debug!(host = %self.label, ?sample, "Probe sample");
        self.history.append(sample);
    }

    /// Set the terminal status. Only the first call has any effect.
    pub fn fail(&self, status: impl Into<String>) {
        let status = status.into();
        if self.status.set(status).is_err() {
            tracing::debug!(host = %self.label, "Terminal status already set");
        }
    }

    /// Run `prober` until shutdown or a terminal failure.
    ///
    /// A failure is stored as the host's status rather than returned.
    pub async fn run_probe(&self, prober: &dyn Prober, shutdown: &CancellationToken) {
        tracing::info!(host = %self.label, probe = prober.kind(), interval = ?self.interval, "Probe started");

        match prober.run(self, shutdown).await {
            Ok(()) => {
                tracing::info!(host = %self.label, "Probe stopped");
            }
            Err(e) => {
                tracing::warn!(host = %self.label, error = %e, "Probe failed");
                self.fail(e.to_string());
            }
        }
    }

    /// Render this host's status line.
    ///
    /// See [`render::render_status`].
    pub fn render_status(&self, host_width: usize, terminal_width: Option<usize>) -> String {
        render::render_status(
            &self.label,
            self.status(),
            &self.history,
            host_width,
            terminal_width,
        )
    }
}
