//! Status line rendering.
//!
//! Turns one host's history into a single fixed-layout terminal line:
//!
//! ```text
//! <host> <min>     <mean>    <max>     <stdev>   <rate> <history glyphs>
//! ```
//!
//! Latency columns are milliseconds with three decimals. The history trail
//! shows one glyph per sample, oldest first, and is coloured only where the
//! outcome changes so long runs stay compact.

use crossterm::Command;
use crossterm::style::{Color, ResetColor, SetForegroundColor};

use crate::history::{ResultBuffer, Sample};

/// Width of each latency column.
pub const FIELD_WIDTH: usize = 9;

/// Width of the success rate column (`100%` plus padding).
pub const RATE_WIDTH: usize = 5;

/// Width of the whole statistics block, separators included.
pub const STATS_WIDTH: usize = 4 * FIELD_WIDTH + RATE_WIDTH + 4;

/// Columns used besides the host label and the statistics block: the two
/// separating spaces plus the last terminal column, left empty so the line
/// never wraps.
const LINE_OVERHEAD: usize = 3;

/// Glyph for a tick that got a reply.
pub const REPLY_GLYPH: char = '.';

/// Glyph for a tick without a reply.
pub const LOST_GLYPH: char = '!';

const PLACEHOLDER: &str = "-";

/// Summary statistics over one history window.
#[derive(Debug, Clone, PartialEq)]
pub enum Stats {
    /// No successful sample in the window.
    Empty,
    /// Exactly one successful sample; only the minimum is meaningful.
    Single { min: f64 },
    /// Two or more successful samples.
    Full {
        min: f64,
        mean: f64,
        max: f64,
        stdev: f64,
        /// Successful samples as a truncated percentage of all samples.
        success_rate: usize,
    },
}

impl Stats {
    /// Compute statistics over `samples` (the unfiltered window).
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Self {
        let mut total = 0usize;
        let mut latencies = Vec::new();
        for sample in samples {
            total += 1;
            if let Some(ms) = sample.latency_ms() {
                latencies.push(ms);
            }
        }

        match latencies.as_slice() {
            [] => Self::Empty,
            [only] => Self::Single { min: *only },
            values => {
                let n = values.len() as f64;
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

                Self::Full {
                    min,
                    mean,
                    max,
                    stdev: variance.sqrt(),
                    success_rate: values.len() * 100 / total,
                }
            }
        }
    }

    fn write_fields(&self, line: &mut String) {
        let (min, rest) = match self {
            Self::Empty => (None, None),
            Self::Single { min } => (Some(*min), None),
            Self::Full {
                min,
                mean,
                max,
                stdev,
                success_rate,
            } => (Some(*min), Some((*mean, *max, *stdev, *success_rate))),
        };

        push_latency(line, min);
        match rest {
            Some((mean, max, stdev, rate)) => {
                for value in [mean, max, stdev] {
                    line.push(' ');
                    push_latency(line, Some(value));
                }
                line.push_str(&format!(" {:<RATE_WIDTH$}", format!("{rate}%")));
            }
            None => {
                for _ in 0..3 {
                    line.push(' ');
                    push_latency(line, None);
                }
                line.push_str(&format!(" {PLACEHOLDER:<RATE_WIDTH$}"));
            }
        }
    }
}

fn push_latency(line: &mut String, value: Option<f64>) {
    match value {
        Some(ms) => line.push_str(&format!("{ms:<FIELD_WIDTH$.3}")),
        None => line.push_str(&format!("{PLACEHOLDER:<FIELD_WIDTH$}")),
    }
}

fn push_ansi(line: &mut String, command: impl Command) {
    // Writing into a String is infallible.
    let _ = command.write_ansi(line);
}

/// Number of history glyphs that fit next to the statistics block.
///
/// Never below the history floor; the buffer clamps it anyway.
pub fn history_width(host_width: usize, terminal_width: usize) -> usize {
    terminal_width.saturating_sub(host_width + STATS_WIDTH + LINE_OVERHEAD)
}

/// Append the coloured history trail for `samples` to `line`.
fn push_trail<'a>(line: &mut String, samples: impl IntoIterator<Item = &'a Sample>) {
    let mut previous: Option<bool> = None;
    for sample in samples {
        let ok = sample.is_reply();
        if previous != Some(ok) {
            let color = if ok { Color::Green } else { Color::Red };
            push_ansi(line, SetForegroundColor(color));
        }
        line.push(if ok { REPLY_GLYPH } else { LOST_GLYPH });
        previous = Some(ok);
    }
}

/// Render one host's status line.
///
/// When `terminal_width` is given the history buffer is first resized so the
/// glyph trail fills the remaining columns. A terminal `status` replaces the
/// statistics entirely.
pub fn render_status(
    label: &str,
    status: Option<&str>,
    history: &ResultBuffer,
    host_width: usize,
    terminal_width: Option<usize>,
) -> String {
    if let Some(status) = status {
        return format!("{label:<host_width$} {status}");
    }

    if let Some(width) = terminal_width {
        history.resize(history_width(host_width, width));
    }

    history.with_samples(|samples| {
        let mut line = format!("{label:<host_width$} ");
        Stats::from_samples(samples).write_fields(&mut line);
        line.push(' ');
        push_trail(&mut line, samples);
        push_ansi(&mut line, ResetColor);
        line
    })
}
