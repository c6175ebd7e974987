// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! # Fault-tolerant stream negotiation
//!
//! [`FaultTolerantNegotiator`] combines two [`StreamNegotiator`]s, a primary
//! and a secondary one. For incoming streams, both are raced against each
//! other: some transports may hang without ever reporting failure, so
//! instead of trying them one after the other, two workers wait for the
//! peer's first stanza concurrently and the first stream to be established
//! wins. Outgoing streams are created with a plain sequential fallback.

use alloc::sync::Arc;
use std::sync::OnceLock;

use minidom::Element;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use xmpp_parsers::jid::Jid;

use crate::collector::{PacketCollector, StanzaConnection};
use crate::filter::{OrFilter, StanzaFilter};
use crate::negotiator::{IncomingStream, OutgoingStream, StreamNegotiator};
use crate::si::{create_initiation_accept, StreamInitiation};
use crate::Error;


/// Number of concurrent workers per incoming negotiation.
const WORKERS: usize = 2;

/// Initiation filters of both negotiators, computed once per
/// [`FaultTolerantNegotiator`].
struct InitiationFilters {
    from: Jid,
    session_id: String,
    primary: Arc<dyn StanzaFilter>,
    secondary: Arc<dyn StanzaFilter>,
}

/// Which of the two negotiators handles a stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primary,
    Secondary,
}

/// The primary negotiator handles every stanza its initiation filter
/// accepts, the secondary one everything else.
fn determine_negotiator(primary_filter: &dyn StanzaFilter, stanza: &Element) -> Side {
    if primary_filter.accept(stanza) {
        Side::Primary
    } else {
        Side::Secondary
    }
}

/// Resources of one incoming negotiation which must be released on every
/// exit path, including the caller dropping the future.
struct RaceGuard<T: PacketCollector> {
    collector: Arc<T>,
    cancel: CancellationToken,
    workers: JoinSet<Result<IncomingStream, Error>>,
}

impl<T: PacketCollector> RaceGuard<T> {
    /// Stop all workers and wait until they are gone.
    ///
    /// The collector is cancelled when the guard is dropped afterwards.
    async fn release(mut self) {
        self.cancel.cancel();
        self.workers.shutdown().await;
    }
}

impl<T: PacketCollector> Drop for RaceGuard<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.workers.abort_all();
        self.collector.cancel();
        log::trace!("negotiation workers and collector released");
    }
}

/// Stream negotiator falling back from a primary to a secondary transport.
pub struct FaultTolerantNegotiator<P, S, C> {
    primary: Arc<P>,
    secondary: Arc<S>,
    connection: C,
    filters: OnceLock<InitiationFilters>,
}

impl<P: StreamNegotiator, S: StreamNegotiator, C: StanzaConnection>
    FaultTolerantNegotiator<P, S, C>
{
    /// Combine `primary` and `secondary`, negotiating over `connection`.
    pub fn new(connection: C, primary: P, secondary: S) -> Self {
        Self {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            connection,
            filters: OnceLock::new(),
        }
    }

    /// The primary negotiator.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The secondary negotiator.
    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    fn cached_filters(&self, from: &Jid, session_id: &str) -> &InitiationFilters {
        let filters = self.filters.get_or_init(|| InitiationFilters {
            from: from.clone(),
            session_id: session_id.to_owned(),
            primary: self.primary.initiation_filter(from, session_id),
            secondary: self.secondary.initiation_filter(from, session_id),
        });
        // The filters are only ever computed for the first initiation; this
        // matches long-standing behaviour but breaks reuse across peers.
        if filters.from != *from || filters.session_id != session_id {
            log::debug!(
                "reusing initiation filters for {} / {} while negotiating with {} / {}",
                filters.from,
                filters.session_id,
                from,
                session_id
            );
        }
        filters
    }

    /// Filter matching the first stanza of either negotiator.
    ///
    /// The underlying per-negotiator filters are computed on the first call
    /// and reused afterwards, even for a different `from` or `session_id`.
    pub fn initiation_filter(&self, from: &Jid, session_id: &str) -> OrFilter {
        let filters = self.cached_filters(from, session_id);
        OrFilter::new(filters.primary.clone(), filters.secondary.clone())
    }

    /// Accept `initiation` and establish the incoming stream using whichever
    /// negotiator succeeds first.
    ///
    /// Waits at most one reply timeout per worker. All workers and the
    /// collector are released before this returns or when the future is
    /// dropped. If no worker produced a stream, the error of the worker which
    /// failed last is returned, or [`Error::NegotiationFailed`] if none
    /// failed in time.
    pub async fn create_incoming_stream(
        &self,
        initiation: &StreamInitiation,
    ) -> Result<IncomingStream, Error> {
        let filters = self.cached_filters(&initiation.from, &initiation.session_id);
        let filter = OrFilter::new(filters.primary.clone(), filters.secondary.clone());
        let accept = create_initiation_accept(initiation, &self.namespaces());
        let collector = Arc::new(
            self.connection
                .create_collector_and_send(Arc::new(filter), &accept)
                .await?,
        );
        let reply_timeout = self.connection.reply_timeout();

        let mut race = RaceGuard {
            collector: collector.clone(),
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
        };
        for worker in 0..WORKERS {
            let collector = collector.clone();
            let cancel = race.cancel.clone();
            let primary_filter = filters.primary.clone();
            let primary = self.primary.clone();
            let secondary = self.secondary.clone();
            race.workers.spawn(async move {
                let negotiate = async {
                    let stanza = collector.next_result(reply_timeout).await?;
                    let side = determine_negotiator(&*primary_filter, &stanza);
                    log::debug!("worker {} negotiating with {:?}", worker, side);
                    match side {
                        Side::Primary => primary.negotiate_incoming(stanza).await,
                        Side::Secondary => secondary.negotiate_incoming(stanza).await,
                    }
                };
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(Error::Cancelled),
                    result = negotiate => result,
                }
            });
        }

        let mut stream = None;
        let mut error = None;
        let mut polls = 0;
        while stream.is_none() && polls < WORKERS {
            polls += 1;
            let polled = tokio::time::timeout(reply_timeout, race.workers.join_next()).await;
            let joined = match polled {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    log::trace!("no negotiation worker finished within {:?}", reply_timeout);
                    continue;
                }
            };
            match joined {
                Ok(Ok(negotiated)) => stream = Some(negotiated),
                Ok(Err(e)) => {
                    log::debug!("negotiation worker failed: {}", e);
                    error = Some(e);
                }
                Err(e) if e.is_panic() => {
                    log::warn!("negotiation worker panicked");
                    error = Some(Error::WorkerPanicked);
                }
                Err(_) => log::trace!("negotiation worker was cancelled"),
            }
        }
        race.release().await;

        match (stream, error) {
            (Some(stream), _) => {
                log::debug!("incoming stream {} negotiated", initiation.session_id);
                Ok(stream)
            }
            (None, Some(e)) => Err(e),
            (None, None) => Err(Error::NegotiationFailed),
        }
    }

    /// Create an outgoing stream with the primary negotiator, falling back to
    /// the secondary one if that fails.
    ///
    /// If both fail, the secondary's error is returned.
    pub async fn create_outgoing_stream(
        &self,
        stream_id: &str,
        initiator: &Jid,
        target: &Jid,
    ) -> Result<OutgoingStream, Error> {
        match self
            .primary
            .create_outgoing(stream_id, initiator, target)
            .await
        {
            Ok(stream) => Ok(stream),
            Err(e) => {
                log::debug!(
                    "primary negotiator failed for stream {}: {}, trying secondary",
                    stream_id,
                    e
                );
                self.secondary
                    .create_outgoing(stream_id, initiator, target)
                    .await
            }
        }
    }

    /// Stream method namespaces of both negotiators, primary first.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces = self.primary.namespaces();
        namespaces.extend(self.secondary.namespaces());
        namespaces
    }
}
