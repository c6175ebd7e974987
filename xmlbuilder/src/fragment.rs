// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use alloc::sync::Arc;
use core::fmt;
use core::ops::Range;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::builder::TextBuilder;
use crate::sink::{write_chunked, FragmentSink};

/// A fragment which owns an external resource, such as an open file.
///
/// The resource is owned by the builder until the fragment has been
/// consumed by [`TextBuilder::write_to`], after which
/// [`close`][`Self::close`] is called. [`TextBuilder::materialize`] and
/// [`TextBuilder::char_at`] read the content but leave it open. Since the
/// same fragment may be shared by several builders, `close` must be
/// idempotent.
pub trait ResourceFragment: fmt::Debug + Send + Sync {
    /// Length of the content in bytes.
    fn len(&self) -> usize;

    /// Whether the content is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the whole content.
    fn read_to_string(&self) -> io::Result<String>;

    /// Stream the content to `sink` in chunks of at most `chunk_size`
    /// bytes.
    fn write_chunks(&self, sink: &mut dyn FragmentSink, chunk_size: usize) -> io::Result<()> {
        let text = self.read_to_string()?;
        write_chunked(sink, &text, chunk_size)
    }

    /// Release the underlying resource.
    fn close(&self);
}

fn closed_error(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("file fragment {} already closed", path.display()),
    )
}

/// A fragment backed by a file on disk.
///
/// The file is kept open until the fragment is closed, and its content is
/// only read when the fragment is written or materialised.
#[derive(Debug)]
pub struct FileFragment {
    path: PathBuf,
    len: usize,
    file: Mutex<Option<File>>,
}

impl FileFragment {
    /// Open the file at `path`.
    ///
    /// The length is taken from the file metadata at this point; the file
    /// must not change size while the fragment is alive.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large"))?;
        Ok(Self {
            path,
            len,
            file: Mutex::new(Some(file)),
        })
    }

    /// Whether [`close`][`ResourceFragment::close`] has been called.
    pub fn is_closed(&self) -> bool {
        match self.file.lock() {
            Ok(file) => file.is_none(),
            Err(_) => true,
        }
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "file fragment lock poisoned"))?;
        let file = guard.as_mut().ok_or_else(|| closed_error(&self.path))?;
        file.seek(SeekFrom::Start(0))?;
        f(file)
    }
}

impl ResourceFragment for FileFragment {
    fn len(&self) -> usize {
        self.len
    }

    fn read_to_string(&self) -> io::Result<String> {
        self.with_file(|file| {
            let mut text = String::with_capacity(self.len);
            file.read_to_string(&mut text)?;
            Ok(text)
        })
    }

    fn write_chunks(&self, sink: &mut dyn FragmentSink, chunk_size: usize) -> io::Result<()> {
        self.with_file(|file| {
            let mut buf = vec![0u8; chunk_size.max(4)];
            // Bytes of an incomplete UTF-8 sequence left over from the last
            // read, moved to the front of `buf`.
            let mut carry = 0;
            loop {
                let n = file.read(&mut buf[carry..])?;
                if n == 0 {
                    if carry > 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "file fragment ends in the middle of a character",
                        ));
                    }
                    return Ok(());
                }
                let filled = carry + n;
                let valid = match core::str::from_utf8(&buf[..filled]) {
                    Ok(_) => filled,
                    Err(e) if e.error_len().is_none() => e.valid_up_to(),
                    Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                };
                if valid > 0 {
                    // Validated just above.
                    let text = core::str::from_utf8(&buf[..valid])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    sink.write_chunk(text)?;
                }
                buf.copy_within(valid..filled, 0);
                carry = filled - valid;
            }
        })
    }

    fn close(&self) {
        if let Ok(mut file) = self.file.lock() {
            if file.take().is_some() {
                log::trace!("closed file fragment {}", self.path.display());
            }
        }
    }
}

/// One unit of text held by a [`TextBuilder`].
#[derive(Debug, Clone)]
pub(crate) enum Fragment {
    Static(&'static str),
    Shared(Arc<str>),
    Char(char),
    Slice(Arc<str>, Range<usize>),
    Nested(Arc<TextBuilder>),
    Resource(Arc<dyn ResourceFragment>),
}

impl Fragment {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Static(s) => s.len(),
            Self::Shared(s) => s.len(),
            Self::Char(c) => c.len_utf8(),
            Self::Slice(_, range) => range.len(),
            Self::Nested(builder) => builder.len(),
            Self::Resource(resource) => resource.len(),
        }
    }

    /// Borrow the text of in-memory literal fragments.
    ///
    /// Returns `None` for nested builders and resources.
    pub(crate) fn as_literal<'a>(&'a self, char_buf: &'a mut [u8; 4]) -> Option<&'a str> {
        match self {
            Self::Static(s) => Some(&s[..]),
            Self::Shared(s) => Some(&s[..]),
            Self::Char(c) => Some(&*c.encode_utf8(char_buf)),
            Self::Slice(s, range) => Some(&s[range.clone()]),
            Self::Nested(_) | Self::Resource(_) => None,
        }
    }
}
