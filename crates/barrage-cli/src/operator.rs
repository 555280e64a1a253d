//! ⌨️ The operator's side of the rate prompt.
//!
//! The status loop only ASKS "Rate?". This is where the answer lands: a blank
//! line shows the status again, a number becomes the new target rate, anything
//! else earns a gentle correction. 🦆

use anyhow::{Context, Result};
use async_channel::Receiver;
use barrage::{RateCell, StatusReporter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 🎚️ What the operator meant by that line.
#[derive(Debug, PartialEq)]
pub(crate) enum RateInput {
    ViewStatus,
    NewRate(f64),
    Invalid(String),
}

/// 🔍 Interpret one line of operator input. Rates must be finite and non-negative.
pub(crate) fn parse_rate_input(line: &str) -> RateInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return RateInput::ViewStatus;
    }
    match trimmed.parse::<f64>() {
        Ok(rate) if rate.is_finite() && rate >= 0.0 => RateInput::NewRate(rate),
        _ => RateInput::Invalid(trimmed.to_string()),
    }
}

/// 🧵 Pump stdin lines into a channel from a plain OS thread.
///
/// A blocking stdin read can't be cancelled, so it lives on a detached thread
/// that the process is free to walk away from on exit.
pub(crate) fn spawn_stdin_lines() -> Result<Receiver<String>> {
    let (tx, rx) = async_channel::unbounded();
    std::thread::Builder::new()
        .name("operator-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send_blocking(line).is_err() {
                    break;
                }
            }
        })
        .context("💀 Could not start the stdin reader thread")?;
    Ok(rx)
}

/// 🔄 Apply operator input until cancellation or until the input runs out.
pub(crate) async fn run_operator_input(
    lines: Receiver<String>,
    reporter: StatusReporter,
    rate: RateCell,
    cancel: CancellationToken,
) {
    loop {
        let the_line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.recv() => line,
        };
        let Ok(the_line) = the_line else {
            debug!("⌨️ operator input closed");
            break;
        };

        match parse_rate_input(&the_line) {
            RateInput::ViewStatus => reporter.print_status(false),
            RateInput::NewRate(new_rate) => {
                rate.set(new_rate);
                info!("🎚️ rate changed to {} requests / second", new_rate);
                reporter.println(&format!(
                    "Rate changed to {:.0} requests / second.",
                    new_rate
                ));
            }
            RateInput::Invalid(text) => {
                reporter.println(&format!(
                    "'{}' is not a rate. Enter a number, or press enter to view status.",
                    text
                ));
            }
        }
    }
}
