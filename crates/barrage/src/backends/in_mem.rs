//! 📝 Inline data: the caller handed us the CSV itself instead of telling us where it lives.
//!
//! No disk. No network. No release. The bytes are already on the heap and they
//! will leave when the cursor does. 🦆

use std::io::Cursor;

use super::DataStream;

/// 📦 Wrap an inline literal as a stream. Nothing is owned, so nothing is ever released.
pub(crate) fn inline_stream(literal: &str) -> DataStream {
    DataStream::Inline(Cursor::new(literal.as_bytes().to_vec()))
}
