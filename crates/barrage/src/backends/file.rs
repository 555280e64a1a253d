//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The file didn't exist. The permissions were wrong. Someone passed a single
//! line of CSV without a newline and it got treated as a path (that one's on them).
//!
//! This module opens a local path for reading and hands back an owned stream,
//! so the record source can close the handle when it's done with it.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs::File;

use super::{DataStream, OwnedStream};

/// 🚪 Open a local file for reading. The handle is owned and closed on release.
pub(crate) async fn open_file(path: &Path) -> Result<DataStream> {
    // -- 💀 The door. It's locked. Or it doesn't exist. Or the filesystem lied to you.
    let the_file_handle = File::open(path).await.with_context(|| {
        format!(
            "💀 The door to '{}' would not budge. We checked if it existed (it might not). \
             We checked permissions (they might be wrong). The file remains unopened.",
            path.display()
        )
    })?;

    Ok(DataStream::Owned(Box::new(OwnedStream::new(the_file_handle))))
}
