// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lazy text assembly for outbound stanzas.
//!
//! Serialising a stanza by repeatedly concatenating strings copies the
//! already-built prefix on every step. [`TextBuilder`] instead keeps an
//! ordered list of fragments (literal text, slices of shared text, nested
//! builders and file-backed resources) and only produces a contiguous string
//! when [`materialize`][`TextBuilder::materialize`] is called. The result is
//! cached until the builder is modified again.
//!
//! Alternatively, [`TextBuilder::write_to`] streams the content to a
//! [`FragmentSink`] in bounded chunks without ever holding the whole document
//! in memory.
//!
//! [`XmlBuilder`] adds element, attribute and escaping helpers on top.

#![deny(unsafe_code, missing_docs, bare_trait_objects)]

extern crate alloc;

mod builder;
pub mod error;
mod fragment;
mod sink;
mod xml;

pub use builder::TextBuilder;
pub use error::Error;
pub use fragment::{FileFragment, ResourceFragment};
pub use sink::{FragmentSink, WriteSink, STAGING_CAPACITY};
pub use xml::{escape, XmlBuilder};
