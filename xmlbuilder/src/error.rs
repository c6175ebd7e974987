// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides an error type for this crate.

use std::io;

use core::{error::Error as StdError, fmt};

/// Our main error type.
#[derive(Debug)]
pub enum Error {
    /// The byte index is not smaller than the length of the text.
    IndexOutOfRange {
        /// The offending index.
        index: usize,

        /// The total length of the text at the time of the lookup.
        len: usize,
    },

    /// The byte index points into the middle of a multi-byte character.
    NotCharBoundary(usize),

    /// I/O error from a [`FragmentSink`][`crate::FragmentSink`] or a
    /// [`ResourceFragment`][`crate::ResourceFragment`].
    Io(io::Error),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::IndexOutOfRange { .. } => None,
            Error::NotCharBoundary(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(other: io::Error) -> Self {
        Error::Io(other)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IndexOutOfRange { index, len } => {
                write!(
                    fmt,
                    "index {} out of range for text of length {}",
                    index, len
                )
            }
            Error::NotCharBoundary(index) => {
                write!(fmt, "index {} is not on a character boundary", index)
            }
            Error::Io(e) => write!(fmt, "I/O error: {}", e),
        }
    }
}

/// Our simplified Result type.
pub type Result<T> = ::core::result::Result<T, Error>;
