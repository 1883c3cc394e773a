//! TCP connect probe.
//!
//! Measures how long a TCP handshake to the target port takes. Ticks stay on a
//! fixed cadence: after a successful connect the probe sleeps for whatever is
//! left of the interval, after a timeout it retries immediately.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::history::Sample;
use crate::probe::{Host, ProbeError, Prober, resolve, wait_tick};

/// Wait before the next tick.
///
/// `connect_time` is `None` when the attempt timed out, in which case the
/// timeout has already used up the interval.
pub fn next_wait(interval: Duration, connect_time: Option<Duration>) -> Duration {
    match connect_time {
        Some(elapsed) => interval.saturating_sub(elapsed),
        None => Duration::ZERO,
    }
}

/// TCP port probe.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// One connect attempt. Returns the connect time, or `None` on timeout.
    async fn attempt(&self, host: &Host) -> Result<Option<Duration>, ProbeError> {
        let target = resolve(host.address(), self.port).await?;
        let probe_timeout = host.interval();

        let start = Instant::now();
        let result = timeout(probe_timeout, TcpStream::connect(target)).await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(_stream)) => {
                let ms = elapsed.as_secs_f64() * 1000.0;
                tracing::debug!(host = %host.label(), target = %target, latency_ms = ms, "TCP probe successful");
                host.record(Sample::Reply(ms));
                Ok(Some(elapsed))
            }
            Ok(Err(e)) => {
                tracing::warn!(host = %host.label(), target = %target, error = %e, "TCP probe failed");
                Err(e.into())
            }
            Err(_) => {
                tracing::debug!(host = %host.label(), target = %target, timeout_ms = probe_timeout.as_millis(), "TCP probe timed out");
                host.record(Sample::Lost);
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl Prober for TcpProbe {
    fn kind(&self) -> &'static str {
        "tcp"
    }

    async fn run(&self, host: &Host, shutdown: &CancellationToken) -> Result<(), ProbeError> {
        loop {
            let connect_time = self.attempt(host).await?;
            if !wait_tick(next_wait(host.interval(), connect_time), shutdown).await {
                return Ok(());
            }
        }
    }
}
