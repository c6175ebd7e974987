// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XML namespaces used by stream initiation.

/// XEP-0095: Stream Initiation
pub const SI: &str = "http://jabber.org/protocol/si";

/// XEP-0020: Feature Negotiation
pub const FEATURE_NEG: &str = "http://jabber.org/protocol/feature-neg";

/// XEP-0004: Data Forms
pub const DATA_FORMS: &str = "jabber:x:data";

/// XEP-0065: SOCKS5 Bytestreams
pub const BYTESTREAMS: &str = "http://jabber.org/protocol/bytestreams";

/// XEP-0047: In-Band Bytestreams
pub const IBB: &str = "http://jabber.org/protocol/ibb";

/// RFC 6120: client namespace
pub const JABBER_CLIENT: &str = "jabber:client";
