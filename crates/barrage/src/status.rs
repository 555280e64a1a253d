//! 📣 The status loop: a tiny background task that tells the operator how it's going.
//!
//! 🎬 *[a terminal. a cursor. every ten seconds, a table appears.]*
//!
//! 🧠 Knowledge graph:
//! - States: Idle (quiet, or nowhere to write) → Running (ticking) → Stopped (terminal).
//! - Running = one task, registered with the run's `TaskTracker` before it is scheduled,
//!   so `shutdown()` can always wait it out.
//! - Wake-ups come from three places: the cancel token, the completion signal, and a
//!   10 second interval. `biased` select: termination always beats a tick that's ready
//!   at the same instant.
//! - Every emission goes through [`StatusReporter`], which is a no-op under quiet mode
//!   or without a sink, and which swallows write errors. Reporting is best effort.
//!   It never takes the host process down with it.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::progress::StatsSnapshot;
use crate::rate::RateCell;

/// ⏱️ How often the loop reports. Fixed. Wrap the loop if you need another cadence.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// 🏁 The last thing the loop ever says.
pub const EXIT_LINE: &str = "Exiting status loop";

/// 🖨️ Where status text goes. Shared because the loop and the operator path both write to it.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// 📣 Everything needed to print a report, cloneable into the background task.
#[derive(Clone)]
pub struct StatusReporter {
    pub(crate) quiet: bool,
    pub(crate) output: Option<OutputSink>,
    pub(crate) interactive: bool,
    pub(crate) rate: RateCell,
    pub(crate) stats: Arc<dyn StatsSnapshot>,
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReporter")
            .field("quiet", &self.quiet)
            .field("has_output", &self.output.is_some())
            .field("interactive", &self.interactive)
            .field("rate", &self.rate.get())
            .finish()
    }
}

impl StatusReporter {
    /// 🔇 Would anything we write actually land somewhere?
    pub fn is_enabled(&self) -> bool {
        !self.quiet && self.output.is_some()
    }

    /// ✍️ Write raw text to the sink. Silently does nothing when disabled or on error.
    pub fn print(&self, text: &str) {
        if self.quiet {
            return;
        }
        let Some(output) = &self.output else {
            return;
        };
        // -- 🧯 a poisoned sink is a dead sink. skip it, keep the run alive.
        let Ok(mut the_sink) = output.lock() else {
            trace!("🧯 status sink mutex is poisoned, skipping report");
            return;
        };
        if let Err(err) = the_sink
            .write_all(text.as_bytes())
            .and_then(|_| the_sink.flush())
        {
            trace!("🧯 status write failed, carrying on: {}", err);
        }
    }

    /// ✍️ `print` plus a trailing newline.
    pub fn println(&self, text: &str) {
        self.print(&format!("{}\n", text));
    }

    /// 📊 Print the current snapshot. Non-final reports also offer the rate prompt.
    pub fn print_status(&self, final_report: bool) {
        if !self.is_enabled() {
            return;
        }
        self.print(&self.stats.snapshot());
        if !final_report {
            self.print_rate_prompt();
        }
    }

    /// 🎚️ Invite the operator to change the rate. Only when someone can actually answer.
    pub fn print_rate_prompt(&self) {
        if !self.interactive {
            return;
        }
        self.print(&rate_prompt(self.rate.get()));
    }
}

/// 🎚️ The prompt text, exactly as the operator sees it.
pub fn rate_prompt(rate: f64) -> String {
    format!(
        "\nCurrent rate is {:.0} requests / second. Enter a new rate or press enter to view status.\n\nRate?\n",
        rate
    )
}

/// 🚀 Spawn the status loop onto `tracker`, unless reporting is disabled.
///
/// Returns `false` (and spawns nothing) when the reporter is quiet or has no sink.
/// `data_finished` resolves when the downstream engine is done. A dropped sender
/// counts as done too, the engine is gone either way.
pub(crate) fn spawn_status_loop(
    reporter: StatusReporter,
    tracker: &TaskTracker,
    cancel: CancellationToken,
    data_finished: oneshot::Receiver<()>,
) -> bool {
    if !reporter.is_enabled() {
        debug!("🔇 status loop stays idle: quiet mode or no output sink");
        return false;
    }

    // -- ⏱️ first tick after one full interval, not immediately
    let mut the_ticker = interval_at(Instant::now() + STATUS_INTERVAL, STATUS_INTERVAL);
    the_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracker.spawn(async move {
        debug!("📣 status loop running, every {:?}", STATUS_INTERVAL);
        let mut data_finished = data_finished;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("🛑 status loop saw cancellation");
                    break;
                }
                _ = &mut data_finished => {
                    debug!("🏁 status loop saw the data finish");
                    break;
                }
                _ = the_ticker.tick() => {
                    reporter.print_status(false);
                }
            }
        }
        // -- 🗑️ timer goes first, then the goodbye
        drop(the_ticker);
        reporter.println(EXIT_LINE);
    });
    true
}
