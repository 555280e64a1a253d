//! 🧭 Location strings: one string, three possible destinies.
//!
//! The grammar, in order of precedence (first match wins, no appeals):
//!
//! ```text
//!   ""                     → no data source at all
//!   "...\n..."             → inline literal data (any newline anywhere)
//!   "gs://bucket/a/b.csv"  → remote object, container "bucket", object "a/b.csv"
//!   anything else          → a path on local disk
//! ```
//!
//! ⚠️ A one-line literal with no newline is a local path. Yes, even `a,b`.
//! Callers have come to rely on that, so it stays exactly this weird.

use std::path::Path;

use anyhow::{Result, bail};

/// 🪣 The remote object scheme marker.
pub const GCS_SCHEME: &str = "gs://";

/// 🧭 Where the records live. Borrowed from the caller's string, parsed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location<'a> {
    Empty,
    Inline(&'a str),
    Remote { bucket: &'a str, object: &'a str },
    Local(&'a Path),
}

impl<'a> Location<'a> {
    /// 🔍 Classify a location string. Only malformed `gs://` references can fail.
    pub fn parse(value: &'a str) -> Result<Self> {
        if value.is_empty() {
            return Ok(Location::Empty);
        }
        if value.contains('\n') {
            return Ok(Location::Inline(value));
        }
        if let Some(the_rest) = value.strip_prefix(GCS_SCHEME) {
            // -- ✂️ split at the FIRST slash: bucket names can't have one, object names can have many
            let Some((bucket, object)) = the_rest.split_once('/') else {
                bail!(
                    "💀 Remote location '{}' has no object path. Expected gs://<bucket>/<object>.",
                    value
                );
            };
            if bucket.is_empty() {
                bail!(
                    "💀 Remote location '{}' has an empty bucket name. Expected gs://<bucket>/<object>.",
                    value
                );
            }
            if object.is_empty() {
                bail!(
                    "💀 Remote location '{}' has an empty object name. Expected gs://<bucket>/<object>.",
                    value
                );
            }
            return Ok(Location::Remote { bucket, object });
        }
        Ok(Location::Local(Path::new(value)))
    }
}
