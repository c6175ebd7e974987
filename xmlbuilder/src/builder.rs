// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use alloc::sync::Arc;
use core::fmt;
use core::ops::Range;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::fragment::{Fragment, ResourceFragment};
use crate::sink::{write_chunked, FragmentSink, STAGING_CAPACITY};

/// Ordered collection of text fragments which is only turned into a single
/// string when needed.
///
/// Appending never copies previously appended text, which keeps assembling
/// large stanzas linear in their size. The materialised string is cached
/// until the next append.
///
/// # Concurrency
///
/// Appending requires `&mut self`, reading only `&self`. A builder is meant
/// to be constructed by one owner and then read (materialised or streamed)
/// any number of times, possibly from several threads.
///
/// # Indexing
///
/// All lengths and indexes are in UTF-8 bytes, like [`str::len`].
#[derive(Debug, Clone, Default)]
pub struct TextBuilder {
    fragments: Vec<Fragment>,
    cache: OnceLock<Arc<str>>,
}

impl TextBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            fragments: Vec::with_capacity(20),
            cache: OnceLock::new(),
        }
    }

    fn push(&mut self, fragment: Fragment) -> &mut Self {
        self.fragments.push(fragment);
        self.cache.take();
        self
    }

    /// Append a piece of text.
    pub fn append<T: Into<Arc<str>>>(&mut self, text: T) -> &mut Self {
        self.push(Fragment::Shared(text.into()))
    }

    /// Append a piece of static text without allocating.
    pub fn append_static(&mut self, text: &'static str) -> &mut Self {
        self.push(Fragment::Static(text))
    }

    /// Append a single character.
    pub fn append_char(&mut self, c: char) -> &mut Self {
        self.push(Fragment::Char(c))
    }

    /// Append the sub-range `range` of `text`.
    ///
    /// Only a reference to `text` is kept; the unreferenced parts are not
    /// copied.
    pub fn append_slice(&mut self, text: Arc<str>, range: Range<usize>) -> Result<&mut Self> {
        if range.start > range.end || range.end > text.len() {
            return Err(Error::IndexOutOfRange {
                index: range.end.max(range.start),
                len: text.len(),
            });
        }
        if !text.is_char_boundary(range.start) {
            return Err(Error::NotCharBoundary(range.start));
        }
        if !text.is_char_boundary(range.end) {
            return Err(Error::NotCharBoundary(range.end));
        }
        Ok(self.push(Fragment::Slice(text, range)))
    }

    /// Splice all fragments of `other` into this builder.
    ///
    /// This flattens one level: nested builders inside `other` stay nested.
    /// `other` itself is left untouched.
    pub fn append_builder(&mut self, other: &TextBuilder) -> &mut Self {
        self.fragments.extend(other.fragments.iter().cloned());
        self.cache.take();
        self
    }

    /// Append `other` as a single nested fragment.
    ///
    /// Unlike [`append_builder`][`Self::append_builder`], the subtree is kept
    /// intact, so that [`write_to`][`Self::write_to`] can stream it without
    /// materialising it and any cache of `other` is reused.
    pub fn append_nested(&mut self, other: TextBuilder) -> &mut Self {
        self.push(Fragment::Nested(Arc::new(other)))
    }

    /// Append a fragment which owns an external resource.
    ///
    /// See [`ResourceFragment`] for the ownership rules.
    pub fn append_resource(&mut self, resource: Arc<dyn ResourceFragment>) -> &mut Self {
        self.push(Fragment::Resource(resource))
    }

    /// Number of top-level fragments.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Whether the builder has been materialised since the last append.
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Total length in bytes.
    ///
    /// Without a cache this sums the fragment lengths, which is linear in the
    /// number of fragments.
    pub fn len(&self) -> usize {
        match self.cache.get() {
            Some(cached) => cached.len(),
            None => self.fragments.iter().map(Fragment::len).sum(),
        }
    }

    /// Whether the builder holds no text.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the character starting at byte `index`.
    pub fn char_at(&self, index: usize) -> Result<char> {
        match self.locate_char(index)? {
            Some(c) => Ok(c),
            None => Err(Error::NotCharBoundary(index)),
        }
    }

    /// Like [`char_at`][`Self::char_at`], but returns `Ok(None)` if `index`
    /// is not on a character boundary so that nested lookups can report the
    /// outer index.
    fn locate_char(&self, index: usize) -> Result<Option<char>> {
        if let Some(cached) = self.cache.get() {
            return char_in(cached, index).ok_or(Error::IndexOutOfRange {
                index,
                len: cached.len(),
            });
        }
        let mut remaining = index;
        let mut char_buf = [0u8; 4];
        for fragment in self.fragments.iter() {
            let len = fragment.len();
            if remaining >= len {
                remaining -= len;
                continue;
            }
            return match fragment {
                Fragment::Nested(builder) => builder.locate_char(remaining),
                Fragment::Resource(resource) => {
                    let text = resource.read_to_string()?;
                    Ok(char_in(&text, remaining).flatten())
                }
                literal => Ok(literal
                    .as_literal(&mut char_buf)
                    .and_then(|text| char_in(text, remaining).flatten())),
            };
        }
        Err(Error::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    /// Copy the bytes in `range` into a new string.
    ///
    /// This materialises the builder.
    pub fn substring(&self, range: Range<usize>) -> Result<String> {
        let text = self.materialize()?;
        if range.start > range.end || range.end > text.len() {
            return Err(Error::IndexOutOfRange {
                index: range.end.max(range.start),
                len: text.len(),
            });
        }
        match text.get(range.clone()) {
            Some(s) => Ok(s.to_owned()),
            None if !text.is_char_boundary(range.start) => Err(Error::NotCharBoundary(range.start)),
            None => Err(Error::NotCharBoundary(range.end)),
        }
    }

    /// Build a single contiguous string from all fragments and cache it.
    ///
    /// Calling this again without appending in between returns the very same
    /// allocation. Resource fragments are read but stay open; they are only
    /// released by [`write_to`][`Self::write_to`].
    pub fn materialize(&self) -> Result<Arc<str>> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached.clone());
        }
        let mut text = String::with_capacity(self.len());
        self.append_to_string(&mut text)?;
        Ok(self.cache.get_or_init(|| text.into()).clone())
    }

    fn append_to_string(&self, out: &mut String) -> Result<()> {
        if let Some(cached) = self.cache.get() {
            out.push_str(cached);
            return Ok(());
        }
        let mut char_buf = [0u8; 4];
        for fragment in self.fragments.iter() {
            match fragment {
                Fragment::Nested(builder) => builder.append_to_string(out)?,
                Fragment::Resource(resource) => out.push_str(&resource.read_to_string()?),
                literal => {
                    if let Some(text) = literal.as_literal(&mut char_buf) {
                        out.push_str(text);
                    }
                }
            }
        }
        Ok(())
    }

    /// Stream the content to `sink` without necessarily materialising it.
    ///
    /// Small fragments are collected in a staging buffer of
    /// [`STAGING_CAPACITY`] bytes. Fragments larger than that, resources and
    /// nested builders are written directly after flushing the staging
    /// buffer. Resource fragments are released as they are consumed.
    ///
    /// The output is always identical to [`materialize`][`Self::materialize`].
    pub fn write_to(&self, sink: &mut dyn FragmentSink) -> Result<()> {
        if let Some(cached) = self.cache.get() {
            write_chunked(sink, cached, STAGING_CAPACITY)?;
            self.release_resources();
            return Ok(());
        }

        let mut staging = String::with_capacity(STAGING_CAPACITY);
        let mut char_buf = [0u8; 4];
        for fragment in self.fragments.iter() {
            match fragment {
                Fragment::Nested(builder) => {
                    flush(sink, &mut staging)?;
                    builder.write_to(sink)?;
                }
                Fragment::Resource(resource) => {
                    flush(sink, &mut staging)?;
                    resource.write_chunks(sink, STAGING_CAPACITY)?;
                    resource.close();
                }
                literal => {
                    let Some(text) = literal.as_literal(&mut char_buf) else {
                        continue;
                    };
                    if staging.len() + text.len() <= STAGING_CAPACITY {
                        staging.push_str(text);
                        continue;
                    }
                    flush(sink, &mut staging)?;
                    // A literal fitting an empty buffer is staged, so it may
                    // share a chunk with the literals after it.
                    if text.len() <= STAGING_CAPACITY {
                        staging.push_str(text);
                    } else {
                        write_chunked(sink, text, STAGING_CAPACITY)?;
                    }
                }
            }
        }
        flush(sink, &mut staging)?;
        Ok(())
    }

    fn release_resources(&self) {
        for fragment in self.fragments.iter() {
            match fragment {
                Fragment::Resource(resource) => resource.close(),
                Fragment::Nested(builder) => builder.release_resources(),
                _ => (),
            }
        }
    }
}

fn flush(sink: &mut dyn FragmentSink, staging: &mut String) -> Result<()> {
    if !staging.is_empty() {
        sink.write_chunk(staging)?;
        staging.clear();
    }
    Ok(())
}

/// `None` if out of range, `Some(None)` if not on a char boundary.
fn char_in(text: &str, index: usize) -> Option<Option<char>> {
    if index >= text.len() {
        return None;
    }
    Some(text.get(index..).and_then(|rest| rest.chars().next()))
}

impl fmt::Display for TextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.materialize() {
            Ok(text) => f.write_str(&text),
            Err(e) => {
                log::warn!("failed to materialise text builder: {}", e);
                Err(fmt::Error)
            }
        }
    }
}

impl From<&'static str> for TextBuilder {
    fn from(text: &'static str) -> Self {
        let mut builder = Self::new();
        builder.append_static(text);
        builder
    }
}

impl From<String> for TextBuilder {
    fn from(text: String) -> Self {
        let mut builder = Self::new();
        builder.append(text);
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FileFragment;
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::io;

    #[derive(Default)]
    struct Chunks(Vec<String>);

    impl FragmentSink for Chunks {
        fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
            assert!(!chunk.is_empty());
            assert!(chunk.len() <= STAGING_CAPACITY);
            self.0.push(chunk.to_owned());
            Ok(())
        }
    }

    #[derive(Debug)]
    struct CountingResource {
        text: String,
        closed: AtomicBool,
        releases: AtomicUsize,
    }

    impl CountingResource {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_owned(),
                closed: AtomicBool::new(false),
                releases: AtomicUsize::new(0),
            })
        }
    }

    impl ResourceFragment for CountingResource {
        fn len(&self) -> usize {
            self.text.len()
        }

        fn read_to_string(&self) -> io::Result<String> {
            Ok(self.text.clone())
        }

        fn close(&self) {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.releases.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn streamed(builder: &TextBuilder) -> String {
        let mut sink = Chunks::default();
        builder.write_to(&mut sink).unwrap();
        sink.0.concat()
    }

    fn sample() -> TextBuilder {
        let mut inner = TextBuilder::new();
        inner
            .append_static("<body>")
            .append("héllo")
            .append_static("</body>");

        let mut builder = TextBuilder::new();
        builder
            .append_static("<message to='juliet@example.com'>")
            .append_nested(inner)
            .append_char('€')
            .append_static("</message>");
        builder
    }

    #[test]
    fn materialize_concatenates_in_order() {
        let builder = sample();
        assert_eq!(
            &*builder.materialize().unwrap(),
            "<message to='juliet@example.com'><body>héllo</body>€</message>"
        );
    }

    #[test]
    fn materialize_is_cached() {
        let builder = sample();
        assert!(!builder.is_cached());
        let first = builder.materialize().unwrap();
        let second = builder.materialize().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(builder.is_cached());
    }

    #[test]
    fn append_invalidates_cache() {
        let mut builder = TextBuilder::new();
        builder.append("a");
        assert_eq!(&*builder.materialize().unwrap(), "a");
        builder.append("b");
        assert!(!builder.is_cached());
        assert_eq!(&*builder.materialize().unwrap(), "ab");
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.char_at(1).unwrap(), 'b');
    }

    #[test]
    fn lazy_len_and_char_at_agree_with_materialized() {
        let builder = sample();
        let uncached = builder.clone();
        let text = builder.materialize().unwrap();
        assert_eq!(uncached.len(), text.len());
        assert!(!uncached.is_cached());
        for (index, c) in text.char_indices() {
            assert_eq!(uncached.char_at(index).unwrap(), c);
            assert_eq!(builder.char_at(index).unwrap(), c);
        }
    }

    #[test]
    fn char_at_errors() {
        let builder = sample();
        let len = builder.len();
        assert!(matches!(
            builder.char_at(len),
            Err(Error::IndexOutOfRange { index, len: l }) if index == len && l == len
        ));
        // Second byte of 'é' inside the nested builder.
        let offset = "<message to='juliet@example.com'><body>h".len() + 1;
        assert!(matches!(
            builder.char_at(offset),
            Err(Error::NotCharBoundary(i)) if i == offset
        ));
        builder.materialize().unwrap();
        assert!(matches!(
            builder.char_at(offset),
            Err(Error::NotCharBoundary(i)) if i == offset
        ));
        assert!(matches!(
            builder.char_at(len + 10),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn append_builder_flattens_without_touching_source() {
        let mut source = TextBuilder::new();
        source.append("one").append_nested(TextBuilder::from("two"));
        let mut target = TextBuilder::from("zero");
        target.append_builder(&source).append_builder(&source);
        assert_eq!(source.fragment_count(), 2);
        assert_eq!(target.fragment_count(), 5);
        assert_eq!(&*source.materialize().unwrap(), "onetwo");
        assert_eq!(&*target.materialize().unwrap(), "zeroonetwoonetwo");
    }

    #[test]
    fn append_slice_references_range() {
        let shared: Arc<str> = Arc::from("<presence type='unavailable'/>");
        let mut builder = TextBuilder::new();
        builder.append_slice(shared.clone(), 1..9).unwrap();
        assert_eq!(&*builder.materialize().unwrap(), "presence");
        assert!(matches!(
            builder.append_slice(shared.clone(), 3..100),
            Err(Error::IndexOutOfRange { index: 100, .. })
        ));
        let accented: Arc<str> = Arc::from("é");
        assert!(matches!(
            builder.append_slice(accented, 1..2),
            Err(Error::NotCharBoundary(1))
        ));
    }

    #[test]
    fn substring_slices_materialized_text() {
        let builder = sample();
        assert_eq!(builder.substring(1..8).unwrap(), "message");
        assert!(builder.substring(5..2).is_err());
    }

    #[test]
    fn write_to_matches_materialize_across_fragment_sizes() {
        for size in [
            1,
            100,
            STAGING_CAPACITY - 1,
            STAGING_CAPACITY,
            STAGING_CAPACITY + 1,
            3 * STAGING_CAPACITY + 17,
        ] {
            let mut builder = TextBuilder::new();
            builder
                .append_static("<a>")
                .append("x".repeat(size))
                .append("é".repeat(size / 2 + 1))
                .append_nested(TextBuilder::from("y".repeat(size)))
                .append_static("</a>");
            let streamed = streamed(&builder);
            assert!(!builder.is_cached());
            assert_eq!(streamed, &*builder.materialize().unwrap(), "size {}", size);
            assert_eq!(self::streamed(&builder), streamed, "cached, size {}", size);
        }
    }

    #[test]
    fn small_fragments_are_staged() {
        let mut builder = TextBuilder::new();
        for _ in 0..100 {
            builder.append_static("<x/>");
        }
        let mut sink = Chunks::default();
        builder.write_to(&mut sink).unwrap();
        assert_eq!(sink.0.len(), 1);
    }

    #[test]
    fn overflowing_literal_is_staged_after_flush() {
        let mut builder = TextBuilder::new();
        builder
            .append("a".repeat(10))
            .append("b".repeat(STAGING_CAPACITY - 5))
            .append_char('c');
        let mut sink = Chunks::default();
        builder.write_to(&mut sink).unwrap();
        let mut second = "b".repeat(STAGING_CAPACITY - 5);
        second.push('c');
        assert_eq!(sink.0, vec!["a".repeat(10), second]);
    }

    #[test]
    fn nested_builder_flushes_staging_first() {
        let mut builder = TextBuilder::from("before");
        builder
            .append_nested(TextBuilder::from("inside"))
            .append_static("after");
        let mut sink = Chunks::default();
        builder.write_to(&mut sink).unwrap();
        assert_eq!(sink.0, vec!["before", "inside", "after"]);
    }

    #[test]
    fn write_to_releases_resources_once() {
        let resource = CountingResource::new("payload");
        let mut inner = TextBuilder::new();
        inner.append_resource(resource.clone());
        let mut outer = TextBuilder::from("<data>");
        outer.append_builder(&inner).append_static("</data>");

        assert_eq!(&*outer.materialize().unwrap(), "<data>payload</data>");
        assert_eq!(resource.releases.load(Ordering::SeqCst), 0);

        // Cached path still releases.
        assert_eq!(streamed(&outer), "<data>payload</data>");
        assert_eq!(resource.releases.load(Ordering::SeqCst), 1);

        // Same fragment through the source builder.
        assert_eq!(streamed(&inner), "payload");
        assert_eq!(resource.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_resources_are_released() {
        let resource = CountingResource::new("abc");
        let mut inner = TextBuilder::new();
        inner.append_resource(resource.clone());
        let mut outer = TextBuilder::new();
        outer.append_nested(inner);
        assert_eq!(outer.char_at(1).unwrap(), 'b');
        assert_eq!(streamed(&outer), "abc");
        assert!(resource.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn file_fragment_streams_and_closes() {
        let _ = env_logger::builder().is_test(true).try_init();
        let path = std::env::temp_dir().join(format!(
            "xmlbuilder-file-fragment-{}.txt",
            std::process::id()
        ));
        // 3-byte characters so that chunk boundaries fall mid-character.
        let content = "€".repeat(STAGING_CAPACITY);
        std::fs::write(&path, &content).unwrap();

        let file = Arc::new(FileFragment::open(&path).unwrap());
        let mut builder = TextBuilder::from("<data>");
        builder
            .append_resource(file.clone())
            .append_static("</data>");
        assert_eq!(builder.len(), content.len() + 13);
        assert_eq!(builder.char_at(6).unwrap(), '€');

        let expected = format!("<data>{}</data>", content);
        assert_eq!(streamed(&builder), expected);
        assert!(file.is_closed());
        assert!(matches!(builder.materialize(), Err(Error::Io(_))));

        std::fs::remove_file(&path).unwrap();
    }
}
