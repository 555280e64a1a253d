//! 🎛️ The run's shared state: headers, rate, output, data source, and the shutdown plumbing.
//!
//! 🎬 *[one struct. one run. created at start, torn down at the end.]*
//!
//! [`Barrage`] is owned by the caller for the whole run. The downstream engine reads
//! records and the rate through it; the status loop borrows a [`StatusReporter`]
//! snapshot of it; the operator path twists the shared [`RateCell`].
//!
//! 🧠 Knowledge graph:
//! - At most one [`RecordSource`] at a time. Replacing it (even with nothing)
//!   releases whatever the old one owned BEFORE the new one moves in.
//! - The completion signal is a oneshot. [`DataFinished::raise`] eats itself, so
//!   raising twice doesn't compile, let alone happen.
//! - Background tasks (there is exactly one: the status loop) live in a `TaskTracker`.
//!   [`Barrage::shutdown`] closes it and waits.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::backends::{DataStream, GcsOpener, Location, ObjectOpener, open_stream};
use crate::progress::StatsSnapshot;
use crate::rate::RateCell;
use crate::records::RecordSource;
use crate::status::{OutputSink, StatusReporter, spawn_status_loop};

/// 🏁 The one-shot "we're out of records" raiser, handed to the downstream engine.
#[derive(Debug)]
pub struct DataFinished {
    tx: oneshot::Sender<()>,
}

impl DataFinished {
    /// 📢 Tell the status loop the data is done. Consumes the raiser: once per run, by construction.
    pub fn raise(self) {
        // -- 🤷 nobody listening (loop idle or already gone) is fine
        let _ = self.tx.send(());
    }
}

/// 🎛️ Process state for one run.
pub struct Barrage {
    headers: Vec<String>,
    rate: RateCell,
    quiet: bool,
    output: Option<OutputSink>,
    interactive: bool,
    data: Option<RecordSource>,
    opener: Arc<dyn ObjectOpener>,
    stats: Arc<dyn StatsSnapshot>,
    data_finished: Option<DataFinished>,
    data_finished_rx: Option<oneshot::Receiver<()>>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for Barrage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Barrage")
            .field("headers", &self.headers)
            .field("rate", &self.rate.get())
            .field("quiet", &self.quiet)
            .field("has_output", &self.output.is_some())
            .field("interactive", &self.interactive)
            .field("data", &self.data)
            .field("opener", &self.opener)
            .finish()
    }
}

impl Barrage {
    /// 🚀 A fresh run: no data, no output, rate 0, talking to real GCS for `gs://` locations.
    pub fn new(stats: Arc<dyn StatsSnapshot>) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            headers: Vec::new(),
            rate: RateCell::default(),
            quiet: false,
            output: None,
            interactive: false,
            data: None,
            opener: Arc::new(GcsOpener::default()),
            stats,
            data_finished: Some(DataFinished { tx }),
            data_finished_rx: Some(rx),
            tracker: TaskTracker::new(),
        }
    }

    /// 🔧 A run shaped by the loaded config. Output is still up to the caller.
    pub fn from_config(config: &AppConfig, stats: Arc<dyn StatsSnapshot>) -> Self {
        Self::new(stats)
            .with_rate(config.rate)
            .with_quiet(config.quiet)
            .with_interactive(config.interactive)
            .with_opener(Arc::new(GcsOpener::new(config.gcs.clone())))
    }

    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// 🎚️ `true` when an operator input path exists, which turns on the rate prompt.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_rate(self, rate: f64) -> Self {
        self.rate.set(rate);
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn ObjectOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// 🎚️ A handle on the shared rate. Clones see each other's writes.
    pub fn rate(&self) -> RateCell {
        self.rate.clone()
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// 🚪 Resolve `location` into the run's record source.
    ///
    /// Empty location: no-op. Open failures leave the current state untouched.
    /// A header failure clears the freshly installed source before the error goes
    /// back up, so the run never proceeds on a half-configured source.
    pub async fn open_data(
        &mut self,
        cancel: &CancellationToken,
        location: &str,
        headers: bool,
    ) -> Result<()> {
        let the_location = Location::parse(location)?;
        let Some(the_stream) = open_stream(&the_location, self.opener.as_ref(), cancel).await?
        else {
            return Ok(());
        };

        self.set_data(Some(the_stream));

        if headers {
            if let Err(err) = self.read_headers().await {
                self.set_data(None);
                return Err(err);
            }
            info!("📋 headers: {:?}", self.headers);
        }
        Ok(())
    }

    /// 🔄 Install a new stream (or none). The previous source is released first.
    pub fn set_data(&mut self, stream: Option<DataStream>) {
        if let Some(mut the_previous) = self.data.take() {
            debug!("🗑️ releasing previous data source {:?}", the_previous);
            the_previous.release();
        }
        self.data = stream.map(RecordSource::new);
    }

    /// 📋 Consume exactly one record and keep it as the header row.
    ///
    /// Calling it again reads the NEXT record and overwrites the headers. No take-backs.
    pub async fn read_headers(&mut self) -> Result<()> {
        let the_header_row = self
            .read_record()
            .await
            .context("💀 Could not read the header row")?
            .ok_or_else(|| anyhow!("💀 The data source is empty. Expected a header row."))?;
        self.headers = the_header_row;
        Ok(())
    }

    /// 📄 Next record from the active source. `Ok(None)` at end of data.
    pub async fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        let Some(the_source) = self.data.as_mut() else {
            bail!("💀 No data source configured. Nothing to read.");
        };
        the_source.read_record().await
    }

    /// 🏁 Take the completion raiser for the downstream engine. `None` after the first call.
    pub fn completion_handle(&mut self) -> Option<DataFinished> {
        self.data_finished.take()
    }

    /// 🏁 Raise completion directly, if nobody took the raiser already.
    pub fn finish_data(&mut self) {
        match self.data_finished.take() {
            Some(the_raiser) => the_raiser.raise(),
            None => debug!("🏁 completion was already handed off or raised"),
        }
    }

    /// 📣 The reporter the status loop (and anyone else) prints through.
    pub fn reporter(&self) -> StatusReporter {
        StatusReporter {
            quiet: self.quiet,
            output: self.output.clone(),
            interactive: self.interactive,
            rate: self.rate.clone(),
            stats: self.stats.clone(),
        }
    }

    /// 🚀 Start the background status loop. Stays idle under quiet mode or without a sink.
    ///
    /// Must be called from inside a tokio runtime. One loop per run: a second call is a no-op.
    pub fn start_status_loop(&mut self, cancel: CancellationToken) {
        let the_reporter = self.reporter();
        if !the_reporter.is_enabled() {
            debug!("🔇 status reporting disabled");
            return;
        }
        let Some(the_finished_rx) = self.data_finished_rx.take() else {
            warn!("⚠️ status loop already started for this run, not starting another");
            return;
        };
        spawn_status_loop(the_reporter, &self.tracker, cancel, the_finished_rx);
    }

    /// 📊 Print the current snapshot (plus the rate prompt unless `final_report`).
    pub fn print_status(&self, final_report: bool) {
        self.reporter().print_status(final_report);
    }

    /// 📊 Write the raw snapshot to any writer, quiet mode or not.
    pub fn write_status(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        writer.write_all(self.stats.snapshot().as_bytes())
    }

    /// 🛑 Wait for every background task to exit. Call after cancelling or finishing.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        debug!("✅ all background tasks have exited");
    }
}
