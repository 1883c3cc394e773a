//! Monitor: probe lifecycle and the render loop.
//!
//! Spawns one probe task per host, staggered across the first interval, and
//! redraws every host's status line once per interval until all probes have
//! stopped or shutdown is requested.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::probe::{Host, MIN_INTERVAL, ProbeSettings, prober_for, wait_tick};

/// How long shutdown waits for probes to finish before the final render.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Output surface for rendered frames.
pub trait Screen {
    /// Terminal size as `(columns, rows)`, if known.
    fn size(&self) -> Option<(u16, u16)>;

    /// Replace the visible content with `lines`.
    fn draw(&mut self, lines: &[String]) -> io::Result<()>;
}

/// Runs the probes for a set of hosts and renders their status.
pub struct Monitor {
    hosts: Vec<Arc<Host>>,
    interval: Duration,
    settings: ProbeSettings,
    shutdown: CancellationToken,
    probes: JoinSet<()>,
}

impl Monitor {
    /// Create a monitor. Hosts are rendered in the order given.
    pub fn new(hosts: Vec<Host>, interval: Duration, settings: ProbeSettings) -> Self {
        Self {
            hosts: hosts.into_iter().map(Arc::new).collect(),
            interval: interval.max(MIN_INTERVAL),
            settings,
            shutdown: CancellationToken::new(),
            probes: JoinSet::new(),
        }
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    /// Token that stops every probe and the render loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of probe tasks that have not been reaped yet.
    pub fn running_probes(&self) -> usize {
        self.probes.len()
    }

    /// Start delay for the probe at `index`, spreading starts over one interval.
    pub fn start_offset(&self, index: usize) -> Duration {
        let count = u32::try_from(self.hosts.len()).unwrap_or(u32::MAX).max(1);
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.interval / count * index
    }

    /// Spawn one probe task per host.
    pub fn spawn_probes(&mut self) {
        for index in 0..self.hosts.len() {
            let offset = self.start_offset(index);
            let host = Arc::clone(&self.hosts[index]);
            let prober = prober_for(&host, &self.settings);
            let shutdown = self.shutdown.clone();

            self.probes.spawn(async move {
                if !wait_tick(offset, &shutdown).await {
                    return;
                }
                host.run_probe(prober.as_ref(), &shutdown).await;
            });
        }
        tracing::info!(hosts = self.hosts.len(), interval = ?self.interval, "Probes spawned");
    }

    /// Width of the host column: the longest host label.
    pub fn host_width(&self) -> usize {
        self.hosts
            .iter()
            .map(|h| h.label().chars().count())
            .max()
            .unwrap_or(0)
    }

    /// Render all hosts.
    ///
    /// With `truncate` and a known row count, only as many hosts as fit are
    /// shown, followed by a line counting the rest.
    pub fn frame(&self, size: Option<(u16, u16)>, truncate: bool) -> Vec<String> {
        let host_width = self.host_width();
        let columns = size.map(|(columns, _)| usize::from(columns));
        let visible = match size {
            Some((_, rows)) if truncate && self.hosts.len() > usize::from(rows) => {
                usize::from(rows).saturating_sub(1)
            }
            _ => self.hosts.len(),
        };

        let mut lines: Vec<String> = self
            .hosts
            .iter()
            .take(visible)
            .map(|host| host.render_status(host_width, columns))
            .collect();

        let hidden = self.hosts.len() - visible;
        if hidden > 0 {
            lines.push(format!("... {} more hosts", hidden));
        }
        lines
    }

    /// Redraw once per interval until every probe has stopped or shutdown
    /// is requested.
    pub async fn run(&mut self, screen: &mut impl Screen) -> io::Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.reap();
            screen.draw(&self.frame(screen.size(), true))?;

            if self.probes.is_empty() {
                tracing::info!("All probes have stopped");
                break;
            }
        }
        Ok(())
    }

    /// Stop all probes and return a final, untruncated frame.
    pub async fn shutdown(mut self, size: Option<(u16, u16)>) -> Vec<String> {
        self.shutdown.cancel();

        if tokio::time::timeout(SHUTDOWN_GRACE, self.drain()).await.is_err() {
            tracing::warn!(
                remaining = self.probes.len(),
                "Probes did not stop in time, aborting"
            );
            self.probes.abort_all();
        }

        self.frame(size, false)
    }

    fn reap(&mut self) {
        while let Some(result) = self.probes.try_join_next() {
            if let Err(e) = result {
                tracing::error!(error = %e, "Probe task failed");
            }
        }
    }

    async fn drain(&mut self) {
        while let Some(result) = self.probes.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Probe task failed");
            }
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("hosts", &self.hosts.len())
            .field("interval", &self.interval)
            .field("running_probes", &self.probes.len())
            .finish_non_exhaustive()
    }
}
