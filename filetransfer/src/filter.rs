// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Predicates deciding which inbound stanzas a collector receives.

use alloc::sync::Arc;
use core::fmt;

use minidom::Element;
use xmpp_parsers::jid::Jid;

/// A predicate on inbound stanzas.
///
/// Any `Fn(&Element) -> bool` closure is a filter.
pub trait StanzaFilter: Send + Sync {
    /// Whether `stanza` matches.
    fn accept(&self, stanza: &Element) -> bool;
}

impl<F: Fn(&Element) -> bool + Send + Sync> StanzaFilter for F {
    fn accept(&self, stanza: &Element) -> bool {
        self(stanza)
    }
}

/// Matches if any of the wrapped filters matches.
#[derive(Clone, Default)]
pub struct OrFilter {
    filters: Vec<Arc<dyn StanzaFilter>>,
}

impl OrFilter {
    /// Combine two filters.
    pub fn new(a: Arc<dyn StanzaFilter>, b: Arc<dyn StanzaFilter>) -> Self {
        Self {
            filters: vec![a, b],
        }
    }

    /// Add another alternative.
    pub fn push(&mut self, filter: Arc<dyn StanzaFilter>) {
        self.filters.push(filter);
    }
}

impl StanzaFilter for OrFilter {
    fn accept(&self, stanza: &Element) -> bool {
        self.filters.iter().any(|f| f.accept(stanza))
    }
}

impl fmt::Debug for OrFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OrFilter")
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Matches stanzas sent by a given address.
#[derive(Debug, Clone)]
pub struct FromMatches {
    address: Jid,
    bare: bool,
}

impl FromMatches {
    /// Match the exact `from` address.
    pub fn full(address: Jid) -> Self {
        Self {
            address,
            bare: false,
        }
    }

    /// Match any resource of the bare JID of `address`.
    pub fn bare(address: Jid) -> Self {
        Self {
            address,
            bare: true,
        }
    }
}

impl StanzaFilter for FromMatches {
    fn accept(&self, stanza: &Element) -> bool {
        let Some(from) = stanza.attr("from") else {
            return false;
        };
        let Ok(from) = from.parse::<Jid>() else {
            log::trace!("ignoring stanza with unparseable from {:?}", from);
            return false;
        };
        if self.bare {
            from.to_bare() == self.address.to_bare()
        } else {
            from == self.address
        }
    }
}

/// Matches `<iq/>` stanzas of the given type (`get`, `set`, `result` or
/// `error`).
#[derive(Debug, Clone, Copy)]
pub struct IqTypeFilter(pub &'static str);

impl StanzaFilter for IqTypeFilter {
    fn accept(&self, stanza: &Element) -> bool {
        stanza.name() == "iq" && stanza.attr("type") == Some(self.0)
    }
}
