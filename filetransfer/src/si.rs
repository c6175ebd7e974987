// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XEP-0095 stream initiation offers and their acceptance.

use xmlbuilder::XmlBuilder;
use xmpp_parsers::jid::Jid;

use crate::ns;

/// Name of the data form field carrying the chosen stream methods.
pub const STREAM_METHOD_FIELD: &str = "stream-method";

/// A stream initiation offer received from a peer.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInitiation {
    /// Id of the `<iq type='set'/>` carrying the offer.
    pub id: String,

    /// The offering entity.
    pub from: Jid,

    /// The addressee of the offer, usually our own full JID.
    pub to: Option<Jid>,

    /// The `id` attribute of the `<si/>` element, identifying the session.
    pub session_id: String,
}

/// Build the `<iq type='result'/>` accepting `initiation` with the given
/// stream method `namespaces`.
pub fn create_initiation_accept(
    initiation: &StreamInitiation,
    namespaces: &[String],
) -> XmlBuilder {
    let mut values = XmlBuilder::new();
    for namespace in namespaces {
        values.text_element("value", namespace);
    }

    let mut xml = XmlBuilder::new();
    xml.element("iq")
        .xmlns(ns::JABBER_CLIENT)
        .attribute("type", "result")
        .attribute("id", &initiation.id)
        .attribute("to", &initiation.from)
        .optional_attribute("from", initiation.to.as_ref())
        .right_angle_bracket()
        .element("si")
        .xmlns(ns::SI)
        .right_angle_bracket()
        .element("feature")
        .xmlns(ns::FEATURE_NEG)
        .right_angle_bracket()
        .element("x")
        .xmlns(ns::DATA_FORMS)
        .attribute("type", "submit")
        .right_angle_bracket()
        .element("field")
        .attribute("var", STREAM_METHOD_FIELD)
        .right_angle_bracket()
        .nested(values)
        .close_element("field")
        .close_element("x")
        .close_element("feature")
        .close_element("si")
        .close_element("iq");
    xml
}
