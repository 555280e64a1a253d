//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." said every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::backends::GcsConfig;

/// 📦 Everything a run needs to know about itself before it starts.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🧭 Where the records live: inline CSV (has a newline), `gs://bucket/object`, or a path.
    /// Empty means no data source at all.
    #[serde(default)]
    pub data: String,
    /// 📋 Treat the first record as the header row.
    #[serde(default)]
    pub headers: bool,
    /// 🎚️ Starting target rate in requests / second. The operator can change it mid-run.
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// 🔇 Suppress every status line, prompt, and goodbye.
    #[serde(default)]
    pub quiet: bool,
    /// ⌨️ Read rate changes from stdin and show the rate prompt.
    #[serde(default)]
    pub interactive: bool,
    /// 🪣 How to reach `gs://` objects.
    #[serde(default)]
    pub gcs: GcsConfig,
}

// 🎚️ 10 requests per second: gentle enough to not page anyone, brisk enough to notice.
fn default_rate() -> f64 {
    10.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: String::new(),
            headers: false,
            rate: default_rate(),
            quiet: false,
            interactive: false,
            gcs: GcsConfig::default(),
        }
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 `BARRAGE_*` environment variables are the base layer, a TOML file (if given)
/// is merged on top and wins on conflicts. Nested keys use a double underscore:
/// `BARRAGE_GCS__BEARER_TOKEN`.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("BARRAGE_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (BARRAGE_*). \
             Check the types: rate is a number, headers/quiet/interactive are booleans.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BARRAGE_*). \
                 No file was provided, this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let mut the_file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 Failed to create a temp config. The filesystem said 'new phone who dis'.");
        the_file
            .write_all(contents.as_bytes())
            .expect("💀 Failed to write test config.");
        the_file
    }

    #[test]
    fn the_one_where_every_knob_comes_from_the_file() {
        let the_file = write_test_config(
            r#"
            data = "gs://targets/day1.csv"
            headers = true
            rate = 250.0
            quiet = true
            interactive = true

            [gcs]
            endpoint = "http://localhost:4443"
            bearer_token = "sekret"
            "#,
        );

        let app_config = load_config(Some(the_file.path()))
            .expect("💀 Full config should parse. The schema drift goblin does not get this win.");

        assert_eq!(app_config.data, "gs://targets/day1.csv");
        assert!(app_config.headers);
        assert_eq!(app_config.rate, 250.0);
        assert!(app_config.quiet);
        assert!(app_config.interactive);
        assert_eq!(app_config.gcs.endpoint, "http://localhost:4443");
        assert_eq!(app_config.gcs.bearer_token.as_deref(), Some("sekret"));
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        let the_file = write_test_config("headers = true\n");

        let app_config: AppConfig = Figment::new()
            .merge(Toml::file(the_file.path()))
            .extract()
            .expect("💀 Defaults should fill in everything else.");

        assert!(app_config.data.is_empty());
        assert!(app_config.headers);
        assert_eq!(app_config.rate, 10.0);
        assert!(!app_config.quiet);
        assert!(!app_config.interactive);
        assert_eq!(app_config.gcs.endpoint, "https://storage.googleapis.com");
        assert!(app_config.gcs.bearer_token.is_none());
    }

    #[test]
    fn the_one_where_inline_csv_survives_toml_multiline_strings() {
        let the_file = write_test_config("data = \"\"\"\na,b\n1,2\n\"\"\"\n");

        let app_config = load_config(Some(the_file.path())).expect("💀 multiline data should parse");
        // -- 📝 TOML trims the newline right after the opening quotes
        assert_eq!(app_config.data, "a,b\n1,2\n");
    }

    #[test]
    fn the_one_where_a_bad_type_names_the_file() {
        let the_file = write_test_config("rate = \"fast\"\n");

        let the_err = load_config(Some(the_file.path())).unwrap_err();
        assert!(format!("{}", the_err).contains(&the_file.path().display().to_string()));
    }

    #[test]
    fn the_one_where_toml_strings_parse_without_figment() {
        // -- 🍞 sanity check that the struct is plain serde, no figment magic required
        let app_config: AppConfig =
            toml::from_str("data = \"targets.csv\"\nrate = 3.5\n").expect("💀 plain toml parse");
        assert_eq!(app_config.data, "targets.csv");
        assert_eq!(app_config.rate, 3.5);
    }
}
