// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! # Stanza collectors
//!
//! A collector is a filtered, cancellable subscription to inbound stanzas.
//! The negotiation code only relies on the [`PacketCollector`] and
//! [`StanzaConnection`] traits; [`StanzaRouter`] is a small in-memory
//! implementation which is fed by whatever reads the stream.

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use core::future::Future;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};

use minidom::Element;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use xmlbuilder::XmlBuilder;
use xmpp_parsers::stanza_error::{DefinedCondition, ErrorType, StanzaError};

use crate::filter::StanzaFilter;
use crate::Error;

/// Reply timeout used by [`StanzaRouter::new`].
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking, cancellable source of stanzas matching a filter.
pub trait PacketCollector: Send + Sync + 'static {
    /// Wait for the next matching stanza.
    ///
    /// Fails with [`Error::NoResponse`] after `timeout`, with
    /// [`Error::Cancelled`] once [`cancel`][`Self::cancel`] has been called
    /// and with [`Error::Remote`] if the stanza is an `<iq type='error'/>`.
    ///
    /// Must be safe to call from several tasks at the same time; each stanza
    /// is handed to exactly one caller.
    fn next_result(&self, timeout: Duration)
        -> impl Future<Output = Result<Element, Error>> + Send;

    /// Stop collecting and wake up all pending callers.
    ///
    /// Calling this more than once has no further effect.
    fn cancel(&self);
}

/// The parts of an XMPP connection needed to negotiate streams.
pub trait StanzaConnection: Send + Sync {
    /// The collector type handed out by this connection.
    type Collector: PacketCollector;

    /// Register a collector for `filter` and send `stanza`, as one step so
    /// that no reply can slip through in between.
    fn create_collector_and_send(
        &self,
        filter: Arc<dyn StanzaFilter>,
        stanza: &XmlBuilder,
    ) -> impl Future<Output = Result<Self::Collector, Error>> + Send;

    /// How long to wait for a reply.
    fn reply_timeout(&self) -> Duration;
}

/// Turn an `<iq type='error'/>` into [`Error::Remote`].
fn check_error(stanza: Element) -> Result<Element, Error> {
    if stanza.name() != "iq" || stanza.attr("type") != Some("error") {
        return Ok(stanza);
    }
    let error = stanza
        .children()
        .find(|child| child.name() == "error")
        .and_then(|child| match StanzaError::try_from(child.clone()) {
            Ok(error) => Some(error),
            Err(e) => {
                log::warn!("received unparseable stanza error: {}", e);
                None
            }
        })
        .unwrap_or_else(|| {
            StanzaError::new(
                ErrorType::Cancel,
                DefinedCondition::UndefinedCondition,
                "en",
                "missing or invalid error element",
            )
        });
    Err(Error::Remote(error))
}

struct Registration {
    filter: Arc<dyn StanzaFilter>,
    tx: mpsc::UnboundedSender<Element>,
}

type CollectorMap = BTreeMap<u64, Registration>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CollectorEntryHandle {
    id: u64,
    map: Weak<Mutex<CollectorMap>>,
}

impl Drop for CollectorEntryHandle {
    fn drop(&mut self) {
        let Some(map) = self.map.upgrade() else {
            return;
        };
        let Some(mut map) = map.lock().ok() else {
            return;
        };
        map.remove(&self.id);
    }
}

/// Collector handed out by [`StanzaRouter`].
///
/// Dropping or cancelling it removes its registration from the router.
pub struct ChannelCollector {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Element>>,
    cancel: CancellationToken,
    entry: Mutex<Option<CollectorEntryHandle>>,
}

impl ChannelCollector {
    /// Whether [`cancel`][`PacketCollector::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl PacketCollector for ChannelCollector {
    async fn next_result(&self, timeout: Duration) -> Result<Element, Error> {
        let recv = async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        let stanza = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
            received = tokio::time::timeout(timeout, recv) => match received {
                Ok(Some(stanza)) => stanza,
                Ok(None) if self.cancel.is_cancelled() => return Err(Error::Cancelled),
                Ok(None) => return Err(Error::Disconnected),
                Err(_) => return Err(Error::NoResponse),
            },
        };
        check_error(stanza)
    }

    fn cancel(&self) {
        self.cancel.cancel();
        if lock(&self.entry).take().is_some() {
            log::trace!("collector unregistered");
        }
    }
}

struct RouterInner {
    collectors: Arc<Mutex<CollectorMap>>,
    next_id: AtomicU64,
    outbound: mpsc::UnboundedSender<String>,
    reply_timeout: Mutex<Duration>,
}

/// In-memory [`StanzaConnection`].
///
/// Outbound stanzas are serialised and handed to the receiver returned by
/// the constructor. Inbound stanzas are fed in with
/// [`route`][`Self::route`] and delivered to every collector whose filter
/// accepts them.
#[derive(Clone)]
pub struct StanzaRouter {
    inner: Arc<RouterInner>,
}

impl StanzaRouter {
    /// Create a router using [`DEFAULT_REPLY_TIMEOUT`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        Self::with_reply_timeout(DEFAULT_REPLY_TIMEOUT)
    }

    /// Create a router with a custom reply timeout.
    pub fn with_reply_timeout(reply_timeout: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Self {
            inner: Arc::new(RouterInner {
                collectors: Arc::new(Mutex::new(CollectorMap::new())),
                next_id: AtomicU64::new(0),
                outbound: tx,
                reply_timeout: Mutex::new(reply_timeout),
            }),
        };
        (router, rx)
    }

    /// Change the reply timeout for subsequent operations.
    pub fn set_reply_timeout(&self, reply_timeout: Duration) {
        *lock(&self.inner.reply_timeout) = reply_timeout;
    }

    /// Register a new collector without sending anything.
    pub fn create_collector(&self, filter: Arc<dyn StanzaFilter>) -> ChannelCollector {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.collectors).insert(id, Registration { filter, tx });
        ChannelCollector {
            rx: tokio::sync::Mutex::new(rx),
            cancel: CancellationToken::new(),
            entry: Mutex::new(Some(CollectorEntryHandle {
                id,
                map: Arc::downgrade(&self.inner.collectors),
            })),
        }
    }

    /// Deliver an inbound stanza.
    ///
    /// Returns whether at least one collector accepted it.
    pub fn route(&self, stanza: Element) -> bool {
        let map = lock(&self.inner.collectors);
        let mut delivered = false;
        for (id, registration) in map.iter() {
            if !registration.filter.accept(&stanza) {
                continue;
            }
            if registration.tx.send(stanza.clone()).is_ok() {
                log::trace!("delivered <{}/> to collector {}", stanza.name(), id);
                delivered = true;
            }
        }
        if !delivered {
            log::trace!("no collector for <{}/>", stanza.name());
        }
        delivered
    }

    /// Number of registered collectors.
    pub fn collector_count(&self) -> usize {
        lock(&self.inner.collectors).len()
    }

    /// Drop all registrations, failing pending collectors with
    /// [`Error::Disconnected`].
    pub fn close(&self) {
        lock(&self.inner.collectors).clear();
    }
}

impl StanzaConnection for StanzaRouter {
    type Collector = ChannelCollector;

    async fn create_collector_and_send(
        &self,
        filter: Arc<dyn StanzaFilter>,
        stanza: &XmlBuilder,
    ) -> Result<ChannelCollector, Error> {
        let mut serialised = String::with_capacity(stanza.len());
        stanza.write_to(&mut serialised)?;
        let collector = self.create_collector(filter);
        if self.inner.outbound.send(serialised).is_err() {
            return Err(Error::Disconnected);
        }
        Ok(collector)
    }

    fn reply_timeout(&self) -> Duration {
        *lock(&self.inner.reply_timeout)
    }
}
