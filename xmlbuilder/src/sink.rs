// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Output destinations for streamed builders.

use std::io;

/// Size of the staging buffer and the upper bound for every chunk handed
/// to a [`FragmentSink`], in bytes.
pub const STAGING_CAPACITY: usize = 8192;

/// An output destination accepting bounded-size writes of text.
///
/// [`TextBuilder::write_to`][`crate::TextBuilder::write_to`] never passes
/// more than [`STAGING_CAPACITY`] bytes in a single call.
pub trait FragmentSink {
    /// Write one chunk of text.
    fn write_chunk(&mut self, chunk: &str) -> io::Result<()>;
}

impl FragmentSink for String {
    fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
        self.push_str(chunk);
        Ok(())
    }
}

/// Adapter to use any [`io::Write`] as a [`FragmentSink`].
///
/// Chunks are written as UTF-8 with [`io::Write::write_all`]; no flushing
/// happens until [`WriteSink::flush`] is called or the writer is dropped.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: io::Write> WriteSink<W> {
    /// Wrap `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Flush the wrapped writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> FragmentSink for WriteSink<W> {
    fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
        self.inner.write_all(chunk.as_bytes())
    }
}

/// Write `text` to `sink` in chunks of at most `chunk_size` bytes, never
/// splitting a character.
pub(crate) fn write_chunked(
    sink: &mut dyn FragmentSink,
    mut text: &str,
    chunk_size: usize,
) -> io::Result<()> {
    while !text.is_empty() {
        let end = floor_char_boundary(text, chunk_size);
        let (chunk, rest) = text.split_at(end);
        sink.write_chunk(chunk)?;
        text = rest;
    }
    Ok(())
}

/// Largest char boundary in `text` which is `<= max`, but at least the end
/// of the first character so that progress is always made.
fn floor_char_boundary(text: &str, max: usize) -> usize {
    if max >= text.len() {
        return text.len();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    if end == 0 {
        // chunk_size smaller than a single character
        text.chars().next().map(char::len_utf8).unwrap_or(0)
    } else {
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Chunks(Vec<String>);

    impl FragmentSink for Chunks {
        fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
            self.0.push(chunk.to_owned());
            Ok(())
        }
    }

    #[test]
    fn chunks_do_not_split_characters() {
        let text = "aé".repeat(5);
        let mut sink = Chunks::default();
        write_chunked(&mut sink, &text, 2).unwrap();
        assert_eq!(sink.0.concat(), text);
        for chunk in &sink.0 {
            assert!(chunk.len() <= 2);
        }
    }

    #[test]
    fn tiny_chunk_size_still_progresses() {
        let mut sink = Chunks::default();
        write_chunked(&mut sink, "ééé", 1).unwrap();
        assert_eq!(sink.0, vec!["é", "é", "é"]);
    }

    #[test]
    fn write_sink_forwards_bytes() {
        let mut sink = WriteSink::new(Vec::new());
        sink.write_chunk("<iq/>").unwrap();
        sink.write_chunk("ü").unwrap();
        assert_eq!(sink.into_inner(), "<iq/>ü".as_bytes());
    }
}
