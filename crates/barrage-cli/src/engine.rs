//! 🚀 The dry-run engine: pulls records out of the barrage and "dispatches" them at the target rate.
//!
//! 🎬 *[a load generator that generates no load. it just logs what it would have sent.]*
//!
//! Each record becomes a JSON payload (keyed by the header row when there is one)
//! logged at debug level. The pacing reads the shared [`RateCell`] before every
//! record, so an operator typing a new rate feels it on the very next one.
//! A rate of zero parks the engine until somebody turns the knob back up. 🦆

use std::time::Duration;

use anyhow::{Context, Result};
use barrage::{Barrage, ProgressCounters, RateCell};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 💤 Longest single nap. Also how often a parked (rate zero) engine checks whether it may move again.
const PARKED_POLL: Duration = Duration::from_secs(1);

/// 🏁 Drain the records, then raise the completion signal no matter how draining went.
pub(crate) async fn run_engine(
    barrage: &mut Barrage,
    counters: &ProgressCounters,
    cancel: &CancellationToken,
) -> Result<u64> {
    let the_finisher = barrage.completion_handle();
    let the_result = drain_records(barrage, counters, cancel).await;
    match the_finisher {
        Some(the_finisher) => the_finisher.raise(),
        None => debug!("🏁 completion was already handed to someone else"),
    }
    the_result
}

/// 🚰 Drain every record from `barrage`, paced by its rate, until end of data or cancellation.
///
/// Returns how many records were dispatched. No data source means nothing to do.
async fn drain_records(
    barrage: &mut Barrage,
    counters: &ProgressCounters,
    cancel: &CancellationToken,
) -> Result<u64> {
    if !barrage.has_data() {
        info!("📭 no data source configured, nothing to dispatch");
        return Ok(0);
    }

    let the_rate = barrage.rate();
    let the_headers = barrage.headers().to_vec();
    let mut the_dispatched = 0u64;

    loop {
        let the_next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = barrage.read_record() => next,
        };
        let the_record = match the_next {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("🏁 end of data after {} records", the_dispatched);
                break;
            }
            Err(err) => {
                counters.record_failed();
                return Err(err).context(format!(
                    "💀 The engine gave up after dispatching {} records",
                    the_dispatched
                ));
            }
        };

        if !wait_for_turn(&the_rate, cancel).await {
            break;
        }

        let the_payload = record_payload(&the_headers, &the_record);
        debug!("🚀 dispatch #{}: {}", the_dispatched + 1, the_payload);
        counters.record_dispatched();
        the_dispatched += 1;
    }

    if cancel.is_cancelled() {
        info!("🛑 cancelled after {} records", the_dispatched);
    }
    Ok(the_dispatched)
}

/// ⏳ Wait out one inter-record gap. `false` if cancelled while waiting.
///
/// The rate is re-read at least every [`PARKED_POLL`], so a change made halfway
/// through a long gap is felt on the spot instead of after the old gap runs out.
async fn wait_for_turn(rate: &RateCell, cancel: &CancellationToken) -> bool {
    let the_start = Instant::now();
    loop {
        let the_waited = the_start.elapsed();
        let the_nap = match inter_record_gap(rate.get()) {
            Some(gap) if the_waited >= gap => return true,
            Some(gap) => (gap - the_waited).min(PARKED_POLL),
            None => PARKED_POLL,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(the_nap) => {}
        }
    }
}

/// 📏 Time between records at `rate`. `None` means parked: zero, negative, NaN, or a
/// rate so small its gap doesn't fit in a `Duration`.
fn inter_record_gap(rate: f64) -> Option<Duration> {
    if rate.is_nan() || rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / rate).ok()
}

/// 📦 A record as the JSON body the engine would send.
///
/// With headers: an object keyed by header name, extra columns become `column_N`
/// (1-based). Without headers: a plain array of strings.
fn record_payload(headers: &[String], record: &[String]) -> Value {
    if headers.is_empty() {
        return Value::Array(record.iter().cloned().map(Value::String).collect());
    }

    let mut the_object = Map::new();
    for (idx, field) in record.iter().enumerate() {
        let the_key = match headers.get(idx) {
            Some(name) => name.clone(),
            None => format!("column_{}", idx + 1),
        };
        the_object.insert(the_key, Value::String(field.clone()));
    }
    Value::Object(the_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    fn strings(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    async fn the_run(data: &str, headers: bool, rate: f64) -> (Barrage, Arc<ProgressCounters>) {
        let the_counters = Arc::new(ProgressCounters::new());
        let mut the_barrage = Barrage::new(the_counters.clone()).with_rate(rate);
        the_barrage
            .open_data(&CancellationToken::new(), data, headers)
            .await
            .unwrap();
        (the_barrage, the_counters)
    }

    #[test]
    fn the_one_where_headers_become_keys() {
        let the_payload = record_payload(&strings(&["method", "url"]), &strings(&["GET", "/"]));
        assert_eq!(the_payload, json!({"method": "GET", "url": "/"}));
    }

    #[test]
    fn the_one_where_extra_columns_get_numbered() {
        let the_payload = record_payload(&strings(&["a"]), &strings(&["1", "2", "3"]));
        assert_eq!(the_payload, json!({"a": "1", "column_2": "2", "column_3": "3"}));
    }

    #[test]
    fn the_one_where_no_headers_means_an_array() {
        let the_payload = record_payload(&[], &strings(&["x", "y"]));
        assert_eq!(the_payload, json!(["x", "y"]));
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_every_record_goes_out_on_schedule() {
        let (mut the_barrage, the_counters) = the_run("a,b\n1,2\n3,4\n5,6\n", true, 10.0).await;
        let the_start = tokio::time::Instant::now();

        let the_count = drain_records(&mut the_barrage, &the_counters, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(the_count, 3);
        assert_eq!(the_counters.dispatched(), 3);
        assert_eq!(the_counters.failed(), 0);
        assert!(the_start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn the_one_where_no_data_is_zero_work() {
        let the_counters = Arc::new(ProgressCounters::new());
        let mut the_barrage = Barrage::new(the_counters.clone()).with_rate(10.0);

        let the_count = drain_records(&mut the_barrage, &the_counters, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(the_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_rate_zero_parks_until_cancelled() {
        let (mut the_barrage, the_counters) = the_run("1\n2\n", false, 0.0).await;
        let the_cancel = CancellationToken::new();
        let the_canceller = the_cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            the_canceller.cancel();
        });

        let the_count = drain_records(&mut the_barrage, &the_counters, &the_cancel)
            .await
            .unwrap();
        assert_eq!(the_count, 0);
        assert_eq!(the_counters.dispatched(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_operator_unparks_the_engine() {
        let (mut the_barrage, the_counters) = the_run("1\n2\n", false, 0.0).await;
        let the_knob = the_barrage.rate();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            the_knob.set(100.0);
        });
        let the_start = tokio::time::Instant::now();

        let the_count = drain_records(&mut the_barrage, &the_counters, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(the_count, 2);
        assert!(the_start.elapsed() >= Duration::from_millis(2500));
    }

    #[test]
    fn the_one_where_absurdly_slow_rates_count_as_parked() {
        assert_eq!(inter_record_gap(4.0), Some(Duration::from_millis(250)));
        assert_eq!(inter_record_gap(0.0), None);
        assert_eq!(inter_record_gap(-3.0), None);
        assert_eq!(inter_record_gap(f64::NAN), None);
        // -- 🐌 1e20 seconds between records does not fit in a Duration
        assert_eq!(inter_record_gap(1e-20), None);
        // -- 🐌 subnormal: the reciprocal is infinity
        assert_eq!(inter_record_gap(5e-324), None);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_microscopic_rate_waits_instead_of_panicking() {
        let the_cancel = CancellationToken::new();
        let the_canceller = the_cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            the_canceller.cancel();
        });

        for the_tiny_rate in [1e-20, 5e-324, 1e-9] {
            assert!(!wait_for_turn(&RateCell::new(the_tiny_rate), &the_cancel).await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_speeding_up_cuts_a_long_gap_short() {
        let the_rate = RateCell::new(0.001);
        let the_knob = the_rate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            the_knob.set(100.0);
        });
        let the_start = tokio::time::Instant::now();

        assert!(wait_for_turn(&the_rate, &CancellationToken::new()).await);
        // -- ⏱️ the old gap was 1000s. the new one is felt within one poll.
        assert!(the_start.elapsed() <= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_finishing_the_data_stops_the_status_loop() {
        let the_buffer = Arc::new(std::sync::Mutex::new(Vec::<u8>::new()));
        let the_sink: barrage::OutputSink = the_buffer.clone();
        let the_counters = Arc::new(ProgressCounters::new());
        let mut the_barrage = Barrage::new(the_counters.clone())
            .with_rate(10.0)
            .with_output(the_sink);
        the_barrage
            .open_data(&CancellationToken::new(), "1\n2\n", false)
            .await
            .unwrap();
        // -- 🎯 this token is never cancelled: only the completion signal can end the loop
        the_barrage.start_status_loop(CancellationToken::new());

        let the_count = run_engine(&mut the_barrage, &the_counters, &CancellationToken::new())
            .await
            .unwrap();
        the_barrage.shutdown().await;

        assert_eq!(the_count, 2);
        let the_text = String::from_utf8(the_buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(the_text, "Exiting status loop\n");
    }

    #[tokio::test]
    async fn the_one_where_a_ragged_row_fails_the_run() {
        // -- 📜 strict CSV: a row with a different field count is a read error
        let (mut the_barrage, the_counters) = the_run("a,b\n1,2\n3\n", false, 1000.0).await;

        let the_err = drain_records(&mut the_barrage, &the_counters, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{:#}", the_err).contains("after dispatching 2 records"));
        assert_eq!(the_counters.failed(), 1);
    }
}
