//! 📜 Record Source: turns a byte stream into comma-separated records, one at a time.
//!
//! 🧠 Knowledge graph:
//! - Wraps a [`DataStream`] in a `csv_async` reader with NO implicit header row.
//!   Header extraction is an explicit, one-record read done by the caller.
//! - If the stream came with a release capability, this source owns it exclusively
//!   and releases it exactly once: on [`RecordSource::release`] or on drop, whichever
//!   comes first.
//! - One logical reader. If two consumers want the same rows, they get to fight
//!   about it somewhere else.

use anyhow::{Context, Result};
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use tracing::{trace, warn};

use crate::backends::DataStream;

/// 📜 A structured-record reader over a single data stream.
pub struct RecordSource {
    // -- 🔒 Option so release/drop can take the reader apart exactly once
    reader: Option<AsyncReader<DataStream>>,
    owns_release: bool,
    records_read: u64,
}

impl std::fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSource")
            .field("open", &self.reader.is_some())
            .field("owns_release", &self.owns_release)
            .field("records_read", &self.records_read)
            .finish()
    }
}

impl RecordSource {
    /// 🚀 Wrap a stream. Comma delimited, no header row assumed.
    pub fn new(stream: DataStream) -> Self {
        let owns_release = stream.is_owned();
        let reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .create_reader(stream);
        Self {
            reader: Some(reader),
            owns_release,
            records_read: 0,
        }
    }

    /// 🔒 Did this source take ownership of a release capability?
    pub fn owns_release(&self) -> bool {
        self.owns_release
    }

    /// 📊 How many records have come out of this source so far (headers included).
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// 📄 Read the next record. `Ok(None)` is end of data.
    pub async fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        let Some(reader) = self.reader.as_mut() else {
            // -- 🏁 released sources are empty sources
            return Ok(None);
        };

        let mut the_record = StringRecord::new();
        let the_next_record_number = self.records_read + 1;
        let got_one = reader.read_record(&mut the_record).await.with_context(|| {
            format!(
                "💀 Could not read record #{} from the data source",
                the_next_record_number
            )
        })?;
        if !got_one {
            return Ok(None);
        }

        self.records_read = the_next_record_number;
        trace!("📄 record #{}: {} fields", self.records_read, the_record.len());
        Ok(Some(the_record.iter().map(str::to_string).collect()))
    }

    /// 🗑️ Let go of the underlying stream. Releases it if we own a release capability.
    ///
    /// Idempotent. Release errors are logged, not returned: the data is already
    /// read or abandoned, and a failed close is not worth failing the run over.
    pub fn release(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        let mut the_stream = reader.into_inner();
        if self.owns_release {
            if let Err(err) = the_stream.release() {
                warn!("⚠️ releasing the data stream failed: {}", err);
            }
        }
    }
}

impl Drop for RecordSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context as TaskContext, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    use crate::backends::ReleasableRead;

    /// 🧪 A stream that counts how many times it got released. Trust issues, quantified.
    pub(crate) struct CountingStream {
        pub(crate) inner: io::Cursor<Vec<u8>>,
        pub(crate) releases: Arc<AtomicUsize>,
    }

    impl CountingStream {
        pub(crate) fn new(text: &str) -> (Self, Arc<AtomicUsize>) {
            let the_counter = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    inner: io::Cursor::new(text.as_bytes().to_vec()),
                    releases: the_counter.clone(),
                },
                the_counter,
            )
        }
    }

    impl AsyncRead for CountingStream {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut TaskContext<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
        }
    }

    impl ReleasableRead for CountingStream {
        fn release(&mut self) -> io::Result<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn inline(text: &str) -> DataStream {
        DataStream::Inline(io::Cursor::new(text.as_bytes().to_vec()))
    }

    #[tokio::test]
    async fn the_one_where_records_come_out_in_order_then_stop() {
        let mut the_source = RecordSource::new(inline("a,b\n1,2\n"));
        assert_eq!(
            the_source.read_record().await.unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            the_source.read_record().await.unwrap(),
            Some(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(the_source.read_record().await.unwrap(), None);
        assert_eq!(the_source.records_read(), 2);
    }

    #[tokio::test]
    async fn the_one_where_quoted_commas_stay_inside_their_field() {
        let mut the_source = RecordSource::new(inline("\"hello, world\",2\n"));
        assert_eq!(
            the_source.read_record().await.unwrap(),
            Some(vec!["hello, world".to_string(), "2".to_string()])
        );
    }

    #[tokio::test]
    async fn the_one_where_a_ragged_row_is_a_read_failure() {
        let mut the_source = RecordSource::new(inline("a,b\n1,2,3\n"));
        the_source.read_record().await.unwrap();
        let the_err = the_source.read_record().await.unwrap_err();
        assert!(format!("{:#}", the_err).contains("record #2"));
    }

    #[tokio::test]
    async fn the_one_where_an_owned_stream_gets_released_exactly_once() {
        let (the_stream, the_releases) = CountingStream::new("x\n");
        let mut the_source = RecordSource::new(DataStream::Owned(Box::new(the_stream)));
        assert!(the_source.owns_release());

        the_source.release();
        the_source.release();
        drop(the_source);
        assert_eq!(the_releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn the_one_where_drop_is_teardown() {
        let (the_stream, the_releases) = CountingStream::new("x\n");
        {
            let _the_source = RecordSource::new(DataStream::Owned(Box::new(the_stream)));
        }
        assert_eq!(the_releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn the_one_where_a_released_source_reads_as_empty() {
        let mut the_source = RecordSource::new(inline("a\nb\n"));
        assert!(!the_source.owns_release());
        the_source.release();
        assert_eq!(the_source.read_record().await.unwrap(), None);
    }
}
