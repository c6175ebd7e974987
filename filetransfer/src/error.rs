// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::error::Error as StdError;
use core::fmt;
use std::io::Error as IoError;

use xmpp_parsers::stanza_error::StanzaError;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// No matching stanza arrived within the reply timeout.
    NoResponse,

    /// The peer answered with a stanza error.
    Remote(StanzaError),

    /// A stream negotiator failed while processing a matched stanza or
    /// while creating an outgoing stream.
    Negotiation(Box<dyn StdError + Send + Sync>),

    /// No negotiator produced a stream and none reported a failure.
    NegotiationFailed,

    /// The operation was cancelled before it completed.
    Cancelled,

    /// The connection went away while waiting for a stanza.
    Disconnected,

    /// A negotiation worker panicked.
    WorkerPanicked,

    /// I/O error
    Io(IoError),

    /// Error while serialising an outbound stanza.
    Builder(xmlbuilder::Error),
}

impl Error {
    /// Wrap a transport-specific failure.
    pub fn negotiation<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Self {
        Error::Negotiation(e.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoResponse => write!(fmt, "no response received within the reply timeout"),
            Error::Remote(e) => write!(fmt, "remote error: {:?}", e.defined_condition),
            Error::Negotiation(e) => write!(fmt, "stream negotiation error: {}", e),
            Error::NegotiationFailed => write!(fmt, "file transfer negotiation failed"),
            Error::Cancelled => write!(fmt, "cancelled"),
            Error::Disconnected => write!(fmt, "disconnected"),
            Error::WorkerPanicked => write!(fmt, "negotiation worker panicked"),
            Error::Io(e) => write!(fmt, "IO error: {}", e),
            Error::Builder(e) => write!(fmt, "stanza serialisation error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Negotiation(e) => Some(&**e),
            Error::Io(e) => Some(e),
            Error::Builder(e) => Some(e),
            Error::NoResponse
            | Error::Remote(_)
            | Error::NegotiationFailed
            | Error::Cancelled
            | Error::Disconnected
            | Error::WorkerPanicked => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<StanzaError> for Error {
    fn from(e: StanzaError) -> Self {
        Error::Remote(e)
    }
}

impl From<xmlbuilder::Error> for Error {
    fn from(e: xmlbuilder::Error) -> Self {
        match e {
            xmlbuilder::Error::Io(e) => Error::Io(e),
            other => Error::Builder(other),
        }
    }
}
