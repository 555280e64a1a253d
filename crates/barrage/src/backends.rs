//! 🔌 Backends: where a location string becomes actual bytes.
//!
//! 🚰 One string walks in. It might be a pile of CSV with newlines in it, a
//! `gs://` object in a bucket far, far away, or a humble path on local disk.
//! One [`DataStream`] walks out. The record reader downstream never learns
//! which door the bytes came through, which is exactly how it should be.
//!
//! 🧠 Knowledge graph:
//! - [`Location`] decides the door (closed enum, ordered dispatch, no guessing at runtime)
//! - `in_mem` → inline literal, `file` → local path, `gcs` → remote object via [`ObjectOpener`]
//! - [`DataStream`] carries an optional release capability. Whoever owns the
//!   stream owns the release. The record source takes both. Nobody else touches it.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) mod file;
pub mod gcs;
pub(crate) mod in_mem;
pub mod location;

pub use gcs::{GcsConfig, GcsOpener, ObjectOpener};
pub use location::Location;

/// 🗑️ A readable stream that can also be explicitly let go of.
///
/// The async cousin of "reader that is also a closer". `release` must be safe to
/// call more than once; after the first call the stream reads as EOF.
pub trait ReleasableRead: AsyncRead + Send + Unpin {
    fn release(&mut self) -> io::Result<()>;
}

/// 🎭 The three shapes a data stream can take.
///
/// - `Inline`: bytes we already hold. Nothing to release, nothing to leak.
/// - `Owned`: a handle with a release capability (files, HTTP bodies). Released on teardown.
/// - `Borrowed`: a plain reader with no release capability. We read it and walk away.
pub enum DataStream {
    Inline(io::Cursor<Vec<u8>>),
    Owned(Box<dyn ReleasableRead>),
    Borrowed(Box<dyn AsyncRead + Send + Unpin>),
}

impl DataStream {
    /// 🔒 Does this stream come with something to release?
    pub fn is_owned(&self) -> bool {
        matches!(self, DataStream::Owned(_))
    }

    /// 🗑️ Release the underlying resource if there is one. No-op otherwise.
    pub fn release(&mut self) -> io::Result<()> {
        match self {
            DataStream::Owned(stream) => stream.release(),
            DataStream::Inline(_) | DataStream::Borrowed(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for DataStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 trait objects don't do Debug, so we just say which door it came through
        let the_shape = match self {
            DataStream::Inline(cursor) => format!("Inline({} bytes)", cursor.get_ref().len()),
            DataStream::Owned(_) => "Owned".to_string(),
            DataStream::Borrowed(_) => "Borrowed".to_string(),
        };
        f.debug_tuple("DataStream").field(&the_shape).finish()
    }
}

impl AsyncRead for DataStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Inline(cursor) => Pin::new(cursor).poll_read(cx, buf),
            DataStream::Owned(stream) => Pin::new(stream).poll_read(cx, buf),
            DataStream::Borrowed(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

/// 📦 Wraps any reader and gives it a release button.
///
/// Releasing drops the inner reader (closing the file / hanging up the HTTP body).
/// Reads after release see a clean EOF instead of a use-after-free shaped surprise.
pub struct OwnedStream<R> {
    inner: Option<R>,
}

impl<R> OwnedStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for OwnedStream<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().inner.as_mut() {
            Some(reader) => Pin::new(reader).poll_read(cx, buf),
            // -- 🏁 released streams are empty streams. the well is capped.
            None => Poll::Ready(Ok(())),
        }
    }
}

impl<R: AsyncRead + Send + Unpin> ReleasableRead for OwnedStream<R> {
    fn release(&mut self) -> io::Result<()> {
        drop(self.inner.take());
        Ok(())
    }
}

/// 🚪 Resolve a parsed [`Location`] into a stream.
///
/// `Ok(None)` means "no data source configured", which is a perfectly respectable
/// life choice and not an error. Every failure carries the location in its context
/// so the 3am reader knows which door was locked.
pub async fn open_stream(
    location: &Location<'_>,
    opener: &dyn ObjectOpener,
    cancel: &CancellationToken,
) -> Result<Option<DataStream>> {
    match *location {
        Location::Empty => {
            debug!("🫙 no data location configured, running without a record source");
            Ok(None)
        }
        Location::Inline(literal) => {
            debug!("📝 using {} bytes of inline data", literal.len());
            Ok(Some(in_mem::inline_stream(literal)))
        }
        Location::Remote { bucket, object } => {
            debug!("🪣 fetching gs://{}/{}", bucket, object);
            let the_stream = opener.open(cancel, bucket, object).await.with_context(|| {
                format!(
                    "💀 Could not open remote object 'gs://{}/{}'. The bucket ghosted us. \
                     Check the bucket name, the object path, and the token.",
                    bucket, object
                )
            })?;
            Ok(Some(the_stream))
        }
        Location::Local(path) => {
            debug!("📂 opening local file {}", path.display());
            Ok(Some(file::open_file(path).await?))
        }
    }
}
