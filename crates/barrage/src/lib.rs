//! 🎯 barrage: feeds records to a rate-driven load generator and keeps the operator informed.
//!
//! 🚰 A location string becomes a [`RecordSource`] (inline CSV, a `gs://` object, or a
//! local file). A background status loop prints progress every ten seconds, offers a
//! rate prompt when someone is at the keyboard, and bows out on cancellation or when
//! the data runs dry. The engine that actually fires requests lives somewhere else.
//! We just keep it fed. 🦆

pub mod app_config;
pub mod backends;
pub mod progress;
pub mod rate;
pub mod records;
pub mod state;
pub mod status;

pub use app_config::{AppConfig, load_config};
pub use backends::{DataStream, GcsConfig, GcsOpener, Location, ObjectOpener, OwnedStream, ReleasableRead};
pub use progress::{ProgressCounters, StatsSnapshot};
pub use rate::RateCell;
pub use records::RecordSource;
pub use state::{Barrage, DataFinished};
pub use status::{EXIT_LINE, OutputSink, STATUS_INTERVAL, StatusReporter};
