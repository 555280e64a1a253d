//! 🚀 barrage-cli: the front door. Loads config, opens the data, starts the status
//! loop, lets the engine drain the records, and turns the lights off on the way out.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! ⌨️ With `interactive = true`, type a number and press enter to change the rate,
//! or just press enter to see where things stand. Ctrl-C stops the run. 🦆

mod engine;
mod operator;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use barrage::{AppConfig, Barrage, OutputSink, ProgressCounters};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🚀 main(): where it all begins. The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Find the config file (or settle for environment variables)
/// 3. Run the thing
/// 4. Handle errors (cry, then exit 1)
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // 🎯 first arg is the config path. no arg, no problem: the ol' reliable default.
    let args: Vec<String> = std::env::args().collect();
    let path_arg = args.get(1).map(String::as_str).unwrap_or("barrage.toml");

    // 🔒 a missing file isn't fatal: BARRAGE_* env vars can carry the whole config
    let config_file = std::path::Path::new(path_arg);
    let config_file_that_exists = match config_file.try_exists().context(format!(
        "💀 Couldn't check whether the configuration file exists. \
         If it's a relative path, pwd/cwd might not be what you think. Was checking here: '{}'",
        config_file.display()
    ))? {
        true => Some(config_file),
        false => {
            info!(
                "📭 no config file at '{}', using BARRAGE_* environment variables only",
                config_file.display()
            );
            None
        }
    };

    let app_config = barrage::load_config(config_file_that_exists)
        .context("💀 barrage couldn't load its configuration. Check the file and the BARRAGE_* variables.")?;

    if let Err(err) = run(app_config).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: the object store isn't reachable. Check `gcs.endpoint` in the config \
                 (or BARRAGE_GCS__ENDPOINT), and if you're pointing at a local emulator, \
                 make sure it's actually running. ☕"
            );
        }

        std::process::exit(1);
    }

    Ok(())
}

/// 🎛️ One full run, start to final status.
async fn run(config: AppConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let counters = Arc::new(ProgressCounters::new());
    let stdout: OutputSink = Arc::new(Mutex::new(std::io::stdout()));

    let mut the_barrage = Barrage::from_config(&config, counters.clone()).with_output(stdout);

    // 🛑 Ctrl-C flips the token. everything else listens to it.
    let the_ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 interrupt received, winding down");
            the_ctrl_c_cancel.cancel();
        }
    });

    the_barrage
        .open_data(&cancel, &config.data, config.headers)
        .await
        .context("💀 Could not open the configured data source")?;

    the_barrage.start_status_loop(cancel.clone());

    let the_operator = if config.interactive {
        let the_lines = operator::spawn_stdin_lines()?;
        Some(tokio::spawn(operator::run_operator_input(
            the_lines,
            the_barrage.reporter(),
            the_barrage.rate(),
            cancel.clone(),
        )))
    } else {
        None
    };

    let the_result = engine::run_engine(&mut the_barrage, &counters, &cancel).await;

    the_barrage.shutdown().await;
    cancel.cancel();
    if let Some(the_operator) = the_operator {
        if let Err(err) = the_operator.await {
            error!("💀 operator input task ended badly: {}", err);
        }
    }

    the_barrage.print_status(true);
    the_barrage.set_data(None);

    let the_dispatched = the_result?;
    info!("✅ run complete: {} records dispatched", the_dispatched);
    Ok(())
}
