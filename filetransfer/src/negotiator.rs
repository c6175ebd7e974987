// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use alloc::sync::Arc;
use core::future::Future;

use minidom::Element;
use tokio::io::{AsyncRead, AsyncWrite};
use xmpp_parsers::jid::Jid;

use crate::filter::StanzaFilter;
use crate::Error;

/// Receiving end of a negotiated bytestream.
pub type IncomingStream = Box<dyn AsyncRead + Send + Unpin>;

/// Sending end of a negotiated bytestream.
pub type OutgoingStream = Box<dyn AsyncWrite + Send + Unpin>;

/// One strategy for establishing an out-of-band bytestream, such as SOCKS5
/// bytestreams or in-band bytestreams.
///
/// Implementors only deal with their own transport; racing several of them
/// is done by [`FaultTolerantNegotiator`][`crate::FaultTolerantNegotiator`].
pub trait StreamNegotiator: Send + Sync + 'static {
    /// Filter matching the first stanza the peer sends to open a stream of
    /// this kind after accepting the stream initiation from `from` for
    /// session `session_id`.
    fn initiation_filter(&self, from: &Jid, session_id: &str) -> Arc<dyn StanzaFilter>;

    /// Complete the negotiation of an incoming stream, given the stanza which
    /// matched [`initiation_filter`][`Self::initiation_filter`].
    fn negotiate_incoming(
        &self,
        stanza: Element,
    ) -> impl Future<Output = Result<IncomingStream, Error>> + Send;

    /// Open an outgoing stream from `initiator` to `target`.
    fn create_outgoing(
        &self,
        stream_id: &str,
        initiator: &Jid,
        target: &Jid,
    ) -> impl Future<Output = Result<OutgoingStream, Error>> + Send;

    /// Stream method namespaces advertised for this transport.
    fn namespaces(&self) -> Vec<String>;
}
