//! ICMP echo probe.
//!
//! Runs one long-lived external `ping` process per host, paced by the host's
//! interval. A reader task drains the process' stdout and stderr into a
//! channel; the probe loop only ever drains that channel on each tick, so
//! blocking pipe reads never delay the tick cadence.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::history::Sample;
use crate::probe::{DEFAULT_PING_COMMAND, Host, ProbeError, Prober, resolve, wait_tick};

/// How long to wait for the echo process to exit after killing it.
const KILL_GRACE: Duration = Duration::from_secs(1);

fn reply_regex() -> &'static Regex {
    static REPLY: OnceLock<Regex> = OnceLock::new();
    REPLY.get_or_init(|| {
        Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("failed to compile reply regex")
    })
}

fn error_regex() -> &'static Regex {
    static ERROR: OnceLock<Regex> = OnceLock::new();
    ERROR.get_or_init(|| {
        Regex::new(r"^[\w./-]*ping[\w.-]*:\s").expect("failed to compile error regex")
    })
}

/// Round-trip time in milliseconds from an echo reply line.
pub fn parse_reply(line: &str) -> Option<f64> {
    reply_regex()
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
}

/// Whether `line` is an error reported by the echo program itself
/// (`ping: unknown host ...`).
pub fn is_error_line(line: &str) -> bool {
    error_regex().is_match(line)
}

/// ICMP probe backed by an external echo process.
#[derive(Debug, Clone)]
pub struct IcmpProbe {
    program: String,
    args: Vec<String>,
}

impl IcmpProbe {
    /// Create a probe from a command line such as `ping` or `ping -n -4`.
    ///
    /// Words after the program are passed before the interval and address.
    pub fn new(command: &str) -> Self {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .unwrap_or_else(|| DEFAULT_PING_COMMAND.to_string());

        Self {
            program,
            args: words.collect(),
        }
    }

    fn spawn(&self, host: &Host) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg("-i")
            .arg(host.interval().as_secs_f64().to_string())
            .arg(host.address())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }

    async fn poll(
        &self,
        host: &Host,
        child: &mut Child,
        lines: &mut mpsc::UnboundedReceiver<String>,
        shutdown: &CancellationToken,
    ) -> Result<(), ProbeError> {
        let limit_ms = host.interval_ms();

        loop {
            if !wait_tick(host.interval(), shutdown).await {
                return Ok(());
            }

            // Only the latest accepted reply counts; one sample per tick.
            let mut latest = None;
            while let Ok(line) = lines.try_recv() {
                if is_error_line(&line) && child.try_wait()?.is_some() {
                    return Err(ProbeError::Process(line));
                }
                match parse_reply(&line) {
                    Some(ms) if ms < limit_ms => latest = Some(ms),
                    Some(ms) => {
                        tracing::debug!(host = %host.label(), latency_ms = ms, "Ignoring stale reply");
                    }
                    None => {}
                }
            }

            host.record(latest.map_or(Sample::Lost, Sample::Reply));

            if let Some(status) = child.try_wait()? {
                tracing::warn!(host = %host.label(), %status, "Echo process exited");
                return Err(ProbeError::ProcessDied);
            }
        }
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProbe {
    fn kind(&self) -> &'static str {
        "icmp"
    }

    async fn run(&self, host: &Host, shutdown: &CancellationToken) -> Result<(), ProbeError> {
        resolve(host.address(), 0).await?;

        let mut child = self.spawn(host)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(pump_output(stdout, stderr, tx));

        let result = self.poll(host, &mut child, &mut rx, shutdown).await;

        stop_child(host, &mut child).await;
        reader.abort();
        result
    }
}

/// Line reader over one child pipe.
///
/// Lines are split on raw bytes and decoded lossily, so output that is not
/// valid UTF-8 never ends the stream. Only end of file or a real read error
/// closes it.
struct OutputLines<R> {
    reader: Option<BufReader<R>>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(inner: Option<R>) -> Self {
        Self {
            reader: inner.map(BufReader::new),
            buf: Vec::new(),
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Next line, or `None` once the pipe is closed.
    ///
    /// Bytes of an unfinished line stay in `buf` if the read is cancelled.
    async fn next_line(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        let read = reader.read_until(b'\n', &mut self.buf).await;
        match read {
            Ok(0) if self.buf.is_empty() => {
                self.reader = None;
                None
            }
            Ok(_) => Some(self.take_line()),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read echo output");
                self.reader = None;
                None
            }
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        self.buf.clear();
        line
    }
}

/// Forward stdout and stderr lines, interleaved, until both pipes close.
async fn pump_output(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    tx: mpsc::UnboundedSender<String>,
) {
    let mut out = OutputLines::new(stdout);
    let mut err = OutputLines::new(stderr);

    loop {
        let (out_open, err_open) = (out.is_open(), err.is_open());
        if !out_open && !err_open {
            return;
        }

        let line = tokio::select! {
            line = out.next_line(), if out_open => line,
            line = err.next_line(), if err_open => line,
        };

        if let Some(line) = line {
            if tx.send(line).is_err() {
                return;
            }
        }
    }
}

/// Ask the echo process to stop and reap it.
async fn stop_child(host: &Host, child: &mut Child) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!(host = %host.label(), error = %e, "Failed to kill echo process");
        return;
    }

    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(host = %host.label(), %status, "Echo process stopped");
        }
        Ok(Err(e)) => {
            tracing::warn!(host = %host.label(), error = %e, "Failed to reap echo process");
        }
        Err(_) => {
            tracing::warn!(host = %host.label(), "Echo process did not exit in time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_linux() {
        let line = "64 bytes from 1.1.1.1: icmp_seq=3 ttl=57 time=12.4 ms";
        assert_eq!(parse_reply(line), Some(12.4));
    }

    #[test]
    fn test_parse_reply_variants() {
        assert_eq!(
            parse_reply("64 bytes from ::1: icmp_seq=1 ttl=64 time=0.042 ms"),
            Some(0.042)
        );
        assert_eq!(parse_reply("Reply from 10.0.0.1: bytes=32 time<1ms TTL=64"), Some(1.0));
        assert_eq!(parse_reply("Reply from 10.0.0.1: bytes=32 time=7ms TTL=64"), Some(7.0));
        assert_eq!(parse_reply("PING 1.1.1.1 (1.1.1.1) 56(84) bytes of data."), None);
        assert_eq!(parse_reply("Request timeout for icmp_seq 4"), None);
    }

    #[test]
    fn test_error_lines() {
        assert!(is_error_line("ping: unknown host nowhere"));
        assert!(is_error_line("ping6: sendmsg: Network is unreachable"));
        assert!(is_error_line("/bin/ping: socket: Operation not permitted"));
        assert!(!is_error_line("64 bytes from 1.1.1.1: icmp_seq=1 time=1 ms"));
        assert!(!is_error_line("PING example.com (93.184.216.34) 56(84) bytes of data."));
    }

    #[test]
    fn test_command_line_split() {
        let probe = IcmpProbe::new("ping -n -4");
        assert_eq!(probe.program, "ping");
        assert_eq!(probe.args, vec!["-n", "-4"]);

        let probe = IcmpProbe::new("   ");
        assert_eq!(probe.program, DEFAULT_PING_COMMAND);
        assert!(probe.args.is_empty());
    }

    #[cfg(unix)]
    mod fake_ping {
        use super::*;
        use std::path::PathBuf;

        /// Write `body` as a shell script and return a command line running it.
        fn fake_command(dir: &tempfile::TempDir, body: &str) -> String {
            let path: PathBuf = dir.path().join("fake-ping.sh");
            std::fs::write(&path, body).unwrap();
            format!("sh {}", path.display())
        }

        async fn run_for(probe: &IcmpProbe, host: &Host, duration: Duration) -> Result<(), ProbeError> {
            let token = CancellationToken::new();
            let canceller = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                canceller.cancel();
            });
            probe.run(host, &token).await
        }

        #[tokio::test]
        async fn test_replies_recorded_per_tick() {
            let dir = tempfile::tempdir().unwrap();
            let command = fake_command(
                &dir,
                "while true; do echo '64 bytes from 127.0.0.1: icmp_seq=1 ttl=64 time=0.042 ms'; sleep 0.05; done\n",
            );
            let probe = IcmpProbe::new(&command);
            let host = Host::new("127.0.0.1", None, Duration::from_millis(200));

            run_for(&probe, &host, Duration::from_millis(700)).await.unwrap();

            let samples = host.history().snapshot();
            assert!(samples.len() >= 2, "expected several ticks, got {samples:?}");
            assert!(samples.iter().all(|s| *s == Sample::Reply(0.042)));
        }

        #[tokio::test]
        async fn test_latest_reply_wins_one_sample_per_tick() {
            let dir = tempfile::tempdir().unwrap();
            // Each burst is one write; first, max and average all differ from
            // the last reply.
            let command = fake_command(
                &dir,
                "while true; do printf 'time=5 ms\\ntime=9 ms\\ntime=6 ms\\n'; sleep 0.05; done\n",
            );
            let probe = IcmpProbe::new(&command);
            let host = Host::new("127.0.0.1", None, Duration::from_millis(200));
            host.history().resize(64);

            run_for(&probe, &host, Duration::from_millis(900)).await.unwrap();

            // 900ms at 200ms per tick: four ticks, one of slack for scheduling.
            let samples = host.history().snapshot();
            assert!(
                (3..=4).contains(&samples.len()),
                "expected one sample per tick, got {samples:?}"
            );
            assert!(
                samples.iter().all(|s| *s == Sample::Reply(6.0)),
                "expected the latest reply of each tick, got {samples:?}"
            );
        }

        #[tokio::test]
        async fn test_non_utf8_output_keeps_stream_open() {
            let dir = tempfile::tempdir().unwrap();
            let command = fake_command(
                &dir,
                "printf 'PING caf\\351 host\\n'\nwhile true; do echo '64 bytes from 127.0.0.1: icmp_seq=1 ttl=64 time=0.042 ms'; sleep 0.05; done\n",
            );
            let probe = IcmpProbe::new(&command);
            let host = Host::new("127.0.0.1", None, Duration::from_millis(200));

            run_for(&probe, &host, Duration::from_millis(900)).await.unwrap();

            let samples = host.history().snapshot();
            assert!(samples.len() >= 3, "expected several ticks, got {samples:?}");
            assert!(
                samples.iter().all(|s| *s == Sample::Reply(0.042)),
                "replies after a non-UTF-8 line must still be recorded, got {samples:?}"
            );
            assert!(host.status().is_none());
        }

        #[tokio::test]
        async fn test_output_lines_decode_lossily() {
            let data: &[u8] = b"PING caf\xe9 host\r\ntime=1.5 ms\npartial";
            let mut lines = OutputLines::new(Some(data));

            assert_eq!(lines.next_line().await.as_deref(), Some("PING caf\u{fffd} host"));
            assert_eq!(lines.next_line().await.as_deref(), Some("time=1.5 ms"));
            assert_eq!(lines.next_line().await.as_deref(), Some("partial"));
            assert_eq!(lines.next_line().await, None);
            assert!(!lines.is_open());
        }

        #[tokio::test]
        async fn test_stale_replies_count_as_lost() {
            let dir = tempfile::tempdir().unwrap();
            let command = fake_command(
                &dir,
                "while true; do echo '64 bytes from 127.0.0.1: icmp_seq=1 ttl=64 time=900 ms'; sleep 0.05; done\n",
            );
            let probe = IcmpProbe::new(&command);
            let host = Host::new("127.0.0.1", None, Duration::from_millis(200));

            run_for(&probe, &host, Duration::from_millis(500)).await.unwrap();

            let samples = host.history().snapshot();
            assert!(!samples.is_empty());
            assert!(samples.iter().all(|s| *s == Sample::Lost));
        }

        #[tokio::test]
        async fn test_process_error_is_terminal() {
            let dir = tempfile::tempdir().unwrap();
            let command = fake_command(&dir, "echo 'ping: nowhere: Name or service not known' >&2\nexit 2\n");
            let probe = IcmpProbe::new(&command);
            let host = Host::new("127.0.0.1", None, Duration::from_millis(200));

            let result = run_for(&probe, &host, Duration::from_secs(5)).await;

            match result {
                Err(ProbeError::Process(line)) => {
                    assert_eq!(line, "ping: nowhere: Name or service not known");
                }
                other => panic!("expected process error, got {other:?}"),
            }
            assert!(host.history().is_empty());
        }

        #[tokio::test]
        async fn test_silent_exit_is_process_died() {
            let dir = tempfile::tempdir().unwrap();
            let command = fake_command(&dir, "exit 0\n");
            let probe = IcmpProbe::new(&command);
            let host = Host::new("127.0.0.1", None, Duration::from_millis(200));

            let result = run_for(&probe, &host, Duration::from_secs(5)).await;

            assert!(matches!(result, Err(ProbeError::ProcessDied)));
            assert_eq!(host.history().snapshot(), vec![Sample::Lost]);
        }

        #[tokio::test]
        async fn test_shutdown_before_first_tick_records_nothing() {
            let dir = tempfile::tempdir().unwrap();
            let command = fake_command(&dir, "sleep 30\n");
            let probe = IcmpProbe::new(&command);
            let host = Host::new("127.0.0.1", None, Duration::from_secs(10));

            run_for(&probe, &host, Duration::from_millis(100)).await.unwrap();

            assert!(host.history().is_empty());
        }

        #[tokio::test]
        async fn test_resolution_failure_skips_process() {
            let probe = IcmpProbe::new("definitely-not-a-real-ping-binary");
            let host = Host::new("no-such-host.invalid", None, Duration::from_millis(200));

            let result = run_for(&probe, &host, Duration::from_secs(5)).await;

            assert!(matches!(result, Err(ProbeError::Resolution)));
            assert!(host.history().is_empty());
        }
    }
}
