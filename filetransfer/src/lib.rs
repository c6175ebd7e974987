// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bytestream negotiation for [XEP-0096](https://xmpp.org/extensions/xep-0096.html)
//! SI file transfer, on top of [tokio](https://tokio.rs/).
//!
//! # Getting started
//!
//! Implement [`StreamNegotiator`] for each transport you support (for
//! example SOCKS5 bytestreams and in-band bytestreams), then combine two of
//! them in a [`FaultTolerantNegotiator`]. When a peer offers a file, call
//! [`FaultTolerantNegotiator::create_incoming_stream`]: this sends the
//! acceptance, waits for the peer to open a stream with either transport
//! and returns the first one which could be established.
//!
//! The negotiator talks to the XMPP connection through the
//! [`StanzaConnection`] and [`PacketCollector`] traits. [`StanzaRouter`] is
//! an in-memory implementation of these.
//!
//! Outbound stanzas are assembled with [`xmlbuilder`].

#![deny(unsafe_code, missing_docs, bare_trait_objects)]

extern crate alloc;

pub mod collector;
mod error;
mod fault_tolerant;
pub mod filter;
mod negotiator;
pub mod ns;
pub mod si;

pub use collector::{
    ChannelCollector, PacketCollector, StanzaConnection, StanzaRouter, DEFAULT_REPLY_TIMEOUT,
};
#[doc(inline)]
/// Generic negotiation error
pub use error::Error;
pub use fault_tolerant::FaultTolerantNegotiator;
pub use filter::StanzaFilter;
pub use negotiator::{IncomingStream, OutgoingStream, StreamNegotiator};
pub use si::{create_initiation_accept, StreamInitiation};

// Re-exports
pub use minidom;
pub use xmlbuilder;
pub use xmpp_parsers as parsers;
pub use xmpp_parsers::jid;
