//! 📊 progress.rs: "Are we there yet?" asks every load test, every time, forever.
//!
//! 🚀 The status loop doesn't know how to count. It just asks for a snapshot
//! every ten seconds and prints whatever it gets. [`StatsSnapshot`] is that
//! question. [`ProgressCounters`] is one honest answer: counts, rates, and a
//! table so comfy it has lumbar support.
//!
//! ⚠️ Watching the snapshot will not make the requests go faster. We've tried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};

/// 📸 Anything that can describe current progress as human-readable text.
///
/// Called on every status tick and on the final report. Must return promptly.
pub trait StatsSnapshot: Send + Sync {
    fn snapshot(&self) -> String;
}

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000" → "1,000,000". you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📊 Lock-free counters a dry-run engine bumps while it dispatches records.
///
/// Share it behind an `Arc`: the engine writes, the status loop reads.
#[derive(Debug)]
pub struct ProgressCounters {
    /// 🚀 records handed to the dispatcher
    dispatched: AtomicU64,
    /// 💀 records the dispatcher choked on
    failed: AtomicU64,
    /// ⏱️ when the run started. hopefully not too long ago.
    start_time: Instant,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// 🎨 Render the counters as a borderless two-column table.
    ///
    /// ```text
    ///   <dispatched> Records   <records/s> Records/s
    ///   <failed> Failed        <elapsed> elapsed
    /// ```
    fn render(&self, elapsed: Duration) -> String {
        let the_dispatched = self.dispatched();
        let the_failed = self.failed();
        let the_rate = if elapsed.as_secs_f64() > 0.0 {
            the_dispatched as f64 / elapsed.as_secs_f64()
        } else {
            // -- 💤 no time has passed. no rate. maintain composure.
            0.0
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} Records", format_number(the_dispatched)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2} Records/s", the_rate)).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} Failed", format_number(the_failed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
        ]);
        format!("{}\n", table)
    }
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSnapshot for ProgressCounters {
    fn snapshot(&self) -> String {
        self.render(self.start_time.elapsed())
    }
}
