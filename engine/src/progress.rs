//! Progress reporting.
//!
//! This module defines the ProgressCallback trait, which decouples the copy
//! routines from any specific output, and `ProgressReporter`, the console
//! implementation every backend uses.
//!
//! The reporter turns a stream of "N more bytes copied" events into a
//! throttled status line that redraws in place, plus one line item per newly
//! named file and a final summary.

use std::io::{self, Stdout, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::fs_ops;

/// Receives progress updates from a running copy.
///
/// Implementations are owned by one in-flight transfer and are not expected
/// to be shared across threads.
pub trait ProgressCallback {
    /// `bytes` more bytes were copied, optionally while working on `file`.
    fn update(&mut self, bytes: u64, file: Option<&str>);

    /// The transfer is over; emit the final summary.
    fn finish(&mut self);
}

/// Minimum time between two redraws of the status line.
pub const RENDER_INTERVAL: Duration = Duration::from_millis(100);

const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte count in 1024-based units with one decimal place.
pub fn format_size(bytes: u64) -> String {
    format_size_f64(bytes as f64)
}

/// Format a throughput in bytes per second.
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_size_f64(bytes_per_sec))
}

fn format_size_f64(mut size: f64) -> String {
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }
    format!("{:.1} {}", size, UNITS[unit_idx])
}

/// Console progress reporter.
///
/// A total of 0 means "unknown": no percentage is shown.
pub struct ProgressReporter<W: Write = Stdout> {
    label: String,
    total_bytes: u64,
    copied_bytes: u64,
    start_time: Instant,
    last_render: Option<Instant>,
    last_file: Option<String>,
    spinner_idx: usize,
    interval: Duration,
    finished: bool,
    out: W,
}

impl ProgressReporter<Stdout> {
    /// A reporter writing to standard output.
    pub fn stdout(total_bytes: u64, label: impl Into<String>) -> Self {
        Self::with_writer(total_bytes, label, io::stdout())
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn with_writer(total_bytes: u64, label: impl Into<String>, out: W) -> Self {
        ProgressReporter {
            label: label.into(),
            total_bytes,
            copied_bytes: 0,
            start_time: Instant::now(),
            last_render: None,
            last_file: None,
            spinner_idx: 0,
            interval: RENDER_INTERVAL,
            finished: false,
            out,
        }
    }

    /// Override the redraw interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn copied_bytes(&self) -> u64 {
        self.copied_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn reached_total(&self) -> bool {
        self.total_bytes > 0 && self.copied_bytes >= self.total_bytes
    }

    fn throughput(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.copied_bytes as f64 / secs
        } else {
            0.0
        }
    }

    fn status_line(&mut self, now: Instant) -> String {
        self.spinner_idx = (self.spinner_idx + 1) % SPINNER.len();
        let speed = format_speed(self.throughput(now - self.start_time));
        let spinner = SPINNER[self.spinner_idx];

        if self.total_bytes > 0 {
            let percent = self.copied_bytes as f64 / self.total_bytes as f64 * 100.0;
            format!(
                "\r{} {} {}/{} ({:.0}%) {}",
                spinner,
                self.label,
                format_size(self.copied_bytes),
                format_size(self.total_bytes),
                percent,
                speed
            )
        } else {
            format!(
                "\r{} {} {} {}",
                spinner,
                self.label,
                format_size(self.copied_bytes),
                speed
            )
        }
    }

    // Write failures on the console are ignored.
    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl<W: Write> ProgressCallback for ProgressReporter<W> {
    fn update(&mut self, bytes: u64, file: Option<&str>) {
        self.copied_bytes += bytes;

        if let Some(name) = file {
            if self.last_file.as_deref() != Some(name) {
                self.last_file = Some(name.to_string());
                self.emit(&format!("  → {}\n", name));
            }
        }

        let now = Instant::now();
        let due = match self.last_render {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if !due && !self.reached_total() {
            return;
        }

        self.last_render = Some(now);
        let line = self.status_line(now);
        self.emit(&line);
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let elapsed = self.start_time.elapsed();
        let line = format!(
            "\r✓ {} {} in {:.1}s ({})\n",
            self.label,
            format_size(self.copied_bytes),
            elapsed.as_secs_f64(),
            format_speed(self.throughput(elapsed))
        );
        self.emit(&line);
    }
}

/// Report a local `source` as a single completed step.
///
/// Used by backends that hand the whole copy to an external tool and only
/// learn that it finished. Nothing is printed when `source` cannot be measured.
pub fn report_whole(source: &str, label: &str) {
    report_whole_to(source, label, io::stdout());
}

fn report_whole_to<W: Write>(source: &str, label: &str, out: W) -> Option<W> {
    let path = Path::new(source);
    let total = fs_ops::total_size(path).ok()?;
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let mut reporter = ProgressReporter::with_writer(total, label, out);
    reporter.update(total, name.as_deref());
    reporter.finish();
    Some(reporter.into_inner())
}
