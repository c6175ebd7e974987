// Copyright (c) 2025 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stanza-oriented helpers on top of [`TextBuilder`].

use alloc::borrow::Cow;
use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::builder::TextBuilder;

/// Escape `text` for use as XML character data or as a single- or
/// double-quoted attribute value.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '\'', '"']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Builds XML text element by element.
///
/// No well-formedness checks are performed: the caller is responsible for
/// balancing [`element`][`Self::element`] and
/// [`close_element`][`Self::close_element`] calls. Element and attribute
/// names are emitted verbatim, attribute values and text are escaped.
///
/// ```
/// use xmlbuilder::XmlBuilder;
///
/// let mut xml = XmlBuilder::new();
/// xml.element("body")
///     .attribute("xml:lang", "en")
///     .right_angle_bracket()
///     .escaped_text("1 < 2")
///     .close_element("body");
/// assert_eq!(xml.to_string(), "<body xml:lang='en'>1 &lt; 2</body>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct XmlBuilder {
    text: TextBuilder,
}

impl XmlBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            text: TextBuilder::new(),
        }
    }

    /// Emit `<name`, leaving the start tag open for attributes.
    pub fn element(&mut self, name: &'static str) -> &mut Self {
        self.text.append_char('<').append_static(name);
        self
    }

    /// Emit an `xmlns` attribute.
    pub fn xmlns(&mut self, ns: &'static str) -> &mut Self {
        self.text
            .append_static(" xmlns='")
            .append_static(ns)
            .append_char('\'');
        self
    }

    /// Emit ` name='value'` with `value` escaped.
    pub fn attribute<V: fmt::Display>(&mut self, name: &'static str, value: V) -> &mut Self {
        let value = value.to_string();
        self.text
            .append_char(' ')
            .append_static(name)
            .append_static("='");
        let escaped = match escape(&value) {
            Cow::Owned(escaped) => Some(escaped),
            Cow::Borrowed(_) => None,
        };
        self.text.append(escaped.unwrap_or(value)).append_char('\'');
        self
    }

    /// Emit the attribute only if `value` is `Some`.
    pub fn optional_attribute<V: fmt::Display>(
        &mut self,
        name: &'static str,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.attribute(name, value);
        }
        self
    }

    /// Close the start tag with `>`.
    pub fn right_angle_bracket(&mut self) -> &mut Self {
        self.text.append_char('>');
        self
    }

    /// Close the start tag with `/>`, making it an empty element.
    pub fn close_empty_element(&mut self) -> &mut Self {
        self.text.append_static("/>");
        self
    }

    /// Emit `</name>`.
    pub fn close_element(&mut self, name: &'static str) -> &mut Self {
        self.text
            .append_static("</")
            .append_static(name)
            .append_char('>');
        self
    }

    /// Emit escaped character data.
    pub fn escaped_text(&mut self, text: &str) -> &mut Self {
        self.text.append(escape(text).as_ref());
        self
    }

    /// Emit `<name>text</name>` with `text` escaped.
    pub fn text_element(&mut self, name: &'static str, text: &str) -> &mut Self {
        self.element(name)
            .right_angle_bracket()
            .escaped_text(text)
            .close_element(name)
    }

    /// Emit pre-serialised XML verbatim.
    pub fn raw(&mut self, xml: &'static str) -> &mut Self {
        self.text.append_static(xml);
        self
    }

    /// Append `child` as one nested fragment, without copying it.
    pub fn nested(&mut self, child: XmlBuilder) -> &mut Self {
        self.text.append_nested(child.text);
        self
    }

    /// Unwrap the underlying [`TextBuilder`].
    pub fn into_text(self) -> TextBuilder {
        self.text
    }
}

impl Deref for XmlBuilder {
    type Target = TextBuilder;

    fn deref(&self) -> &TextBuilder {
        &self.text
    }
}

impl DerefMut for XmlBuilder {
    fn deref_mut(&mut self) -> &mut TextBuilder {
        &mut self.text
    }
}

impl fmt::Display for XmlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.text, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_passthrough_borrows() {
        assert!(matches!(escape("plain text"), Cow::Borrowed("plain text")));
    }

    #[test]
    fn escape_all_special_characters() {
        assert_eq!(
            escape("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&apos;s&lt;/a&gt;"
        );
    }

    #[test]
    fn empty_element_with_attributes() {
        let mut xml = XmlBuilder::new();
        xml.element("open")
            .xmlns("http://jabber.org/protocol/ibb")
            .attribute("block-size", 4096)
            .attribute("sid", "i'm")
            .optional_attribute::<&str>("stanza", None)
            .close_empty_element();
        assert_eq!(
            xml.to_string(),
            "<open xmlns='http://jabber.org/protocol/ibb' block-size='4096' sid='i&apos;m'/>"
        );
    }

    #[test]
    fn nested_builders_keep_order() {
        let mut values = XmlBuilder::new();
        values.text_element("value", "a").text_element("value", "b");

        let mut xml = XmlBuilder::new();
        xml.element("field")
            .attribute("var", "stream-method")
            .right_angle_bracket()
            .nested(values)
            .close_element("field");
        assert_eq!(
            xml.to_string(),
            "<field var='stream-method'><value>a</value><value>b</value></field>"
        );
    }

    #[test]
    fn deref_exposes_text_operations() {
        let mut xml = XmlBuilder::new();
        xml.raw("<presence/>");
        assert_eq!(xml.len(), 11);
        assert_eq!(xml.char_at(1).unwrap(), 'p');
        let mut out = String::new();
        xml.write_to(&mut out).unwrap();
        assert_eq!(out, "<presence/>");
    }
}
