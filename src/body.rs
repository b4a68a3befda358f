//! The BOSH `<body/>` wrapper element
//!
//! Every HTTP request and response in a session carries exactly one
//! `<body/>` element in the `http://jabber.org/protocol/httpbind` namespace.
//! This module provides [`Body`], an immutable attribute map plus an opaque
//! payload fragment, the [`BodyBuilder`] for deriving modified copies, and
//! the XML parser that enforces the wrapper's well-formedness rules:
//!
//! - exactly one `<body/>` root in the BOSH namespace
//! - no comments, processing instructions, or DTDs anywhere
//! - no character data directly inside `<body/>` (child elements may
//!   contain character data)
//!
//! A [`Body`] parsed from raw XML remembers the original text and echoes it
//! byte-for-byte from [`Body::to_xml`], so received bodies can be relayed
//! without re-serialization artifacts.

use std::collections::BTreeMap;
use std::fmt;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// The namespace of the BOSH wrapper element and its attributes.
pub const BOSH_NS: &str = "http://jabber.org/protocol/httpbind";

/// The XML namespace, home of `xml:lang`.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A qualified attribute name: namespace URI plus local name.
///
/// Attribute identity is the full pair. Unprefixed attributes on the
/// wrapper belong to the BOSH namespace; `xml:lang` lives in [`XML_NS`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QName {
    namespace: String,
    local: String,
}

impl QName {
    /// A qualified name in an arbitrary namespace.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// A qualified name in the BOSH namespace.
    pub fn bosh(local: impl Into<String>) -> Self {
        Self::new(BOSH_NS, local)
    }

    /// The namespace URI.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The local name.
    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// An immutable BOSH wrapper element.
///
/// Carries a mapping from [`QName`] to attribute value, any extra declared
/// prefix bindings, and the payload XML fragment as an opaque string. Use
/// [`Body::builder`] to compose one or [`Body::from_xml`] to parse one;
/// derive modified copies through [`Body::rebuild`].
#[derive(Debug, Clone)]
pub struct Body {
    attrs: BTreeMap<QName, String>,
    /// Extra `xmlns:prefix` declarations (prefix -> namespace URI).
    namespaces: BTreeMap<String, String>,
    payload: String,
    /// Original text for bodies parsed from the wire; echoed verbatim.
    raw: Option<String>,
}

impl Body {
    /// An empty body: no attributes, no payload.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Start composing a body from scratch.
    pub fn builder() -> BodyBuilder {
        BodyBuilder {
            attrs: BTreeMap::new(),
            namespaces: BTreeMap::new(),
            payload: String::new(),
        }
    }

    /// Derive a builder pre-populated with this body's attributes, declared
    /// namespaces, and payload.
    ///
    /// The derived body is composed fresh; it does not inherit the raw text
    /// of a parsed body.
    pub fn rebuild(&self) -> BodyBuilder {
        BodyBuilder {
            attrs: self.attrs.clone(),
            namespaces: self.namespaces.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Look up an attribute value by qualified name.
    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Look up an attribute in the BOSH namespace by local name.
    pub fn bosh_attribute(&self, local: &str) -> Option<&str> {
        self.attribute(&QName::bosh(local))
    }

    /// The full attribute map.
    pub fn attributes(&self) -> &BTreeMap<QName, String> {
        &self.attrs
    }

    /// The payload XML fragment between the wrapper tags.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Whether this body carries `type='terminate'`.
    pub fn is_terminate(&self) -> bool {
        self.bosh_attribute("type") == Some("terminate")
    }

    /// Whether this body carries `type='error'`.
    pub fn is_error(&self) -> bool {
        self.bosh_attribute("type") == Some("error")
    }

    /// Serialize to a single `<body/>` element.
    ///
    /// Bodies parsed from the wire echo their original text byte-for-byte;
    /// composed bodies are rendered with the default namespace declaration
    /// first, then extra prefix declarations, then attributes in
    /// deterministic (namespace, local) order.
    pub fn to_xml(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        self.compose()
    }

    fn compose(&self) -> String {
        // Assign prefixes for attributes in foreign namespaces. Declared
        // bindings win; undeclared namespaces get generated `nsN` prefixes.
        let mut uri_to_prefix: BTreeMap<&str, String> = BTreeMap::new();
        for (prefix, uri) in &self.namespaces {
            uri_to_prefix
                .entry(uri.as_str())
                .or_insert_with(|| prefix.clone());
        }
        let mut generated: Vec<(String, &str)> = Vec::new();
        for name in self.attrs.keys() {
            let ns = name.namespace();
            if ns.is_empty() || ns == BOSH_NS || ns == XML_NS {
                continue;
            }
            if !uri_to_prefix.contains_key(ns) {
                let prefix = format!("ns{}", generated.len() + 1);
                uri_to_prefix.insert(ns, prefix.clone());
                generated.push((prefix, ns));
            }
        }

        let mut out = String::with_capacity(self.payload.len() + 128);
        out.push_str("<body xmlns=\"");
        out.push_str(BOSH_NS);
        out.push('"');
        for (prefix, uri) in &self.namespaces {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
            out.push_str(&escape(uri.as_str()));
            out.push('"');
        }
        for (prefix, uri) in &generated {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
            out.push_str(&escape(*uri));
            out.push('"');
        }
        for (name, value) in &self.attrs {
            out.push(' ');
            match name.namespace() {
                "" | BOSH_NS => out.push_str(name.local()),
                XML_NS => {
                    out.push_str("xml:");
                    out.push_str(name.local());
                }
                other => {
                    out.push_str(&uri_to_prefix[other]);
                    out.push(':');
                    out.push_str(name.local());
                }
            }
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.payload.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&self.payload);
            out.push_str("</body>");
        }
        out
    }

    /// Parse a wrapper element from raw XML, preserving the original text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyParse`] when the document is not well-formed,
    /// the root is not a `<body/>` in the BOSH namespace, a comment,
    /// processing instruction, or DTD appears anywhere, or non-whitespace
    /// character data appears directly under the wrapper.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = true;

        let mut root: Option<(BTreeMap<QName, String>, BTreeMap<String, String>)> = None;
        let mut payload_span: Option<(usize, usize)> = None;
        let mut depth = 0usize;
        let mut root_closed = false;

        loop {
            let pos_before = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| Error::BodyParse(e.to_string()))?;
            match event {
                Event::Decl(_) => {
                    if root.is_some() {
                        return Err(Error::BodyParse(
                            "XML declaration after the root element".to_string(),
                        ));
                    }
                }
                Event::DocType(_) => {
                    return Err(Error::BodyParse("DTD is not allowed".to_string()));
                }
                Event::Comment(_) => {
                    return Err(Error::BodyParse("comments are not allowed".to_string()));
                }
                Event::PI(_) => {
                    return Err(Error::BodyParse(
                        "processing instructions are not allowed".to_string(),
                    ));
                }
                Event::Start(e) => {
                    if root_closed {
                        return Err(Error::BodyParse(
                            "content after the root element".to_string(),
                        ));
                    }
                    if root.is_none() {
                        root = Some(parse_root_element(&e)?);
                        payload_span = Some((reader.buffer_position() as usize, xml.len()));
                        depth = 1;
                    } else {
                        depth += 1;
                    }
                }
                Event::Empty(e) => {
                    if root_closed {
                        return Err(Error::BodyParse(
                            "content after the root element".to_string(),
                        ));
                    }
                    if root.is_none() {
                        root = Some(parse_root_element(&e)?);
                        root_closed = true;
                    }
                    // An empty child element leaves the depth unchanged.
                }
                Event::End(_) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::BodyParse("unmatched end tag".to_string()))?;
                    if depth == 0 {
                        if let Some((start, _)) = payload_span {
                            payload_span = Some((start, pos_before));
                        }
                        root_closed = true;
                    }
                }
                Event::Text(t) => {
                    let text = std::str::from_utf8(&t)
                        .map_err(|e| Error::BodyParse(format!("invalid UTF-8: {e}")))?;
                    if !text.trim().is_empty() {
                        if root.is_none() || root_closed {
                            return Err(Error::BodyParse(
                                "character data outside the root element".to_string(),
                            ));
                        }
                        if depth == 1 {
                            return Err(Error::BodyParse(
                                "character data directly inside <body/>".to_string(),
                            ));
                        }
                    }
                }
                Event::CData(_) | Event::GeneralRef(_) => {
                    if root.is_none() || root_closed || depth == 1 {
                        return Err(Error::BodyParse(
                            "character data directly inside <body/>".to_string(),
                        ));
                    }
                }
                Event::Eof => break,
            }
        }

        let Some((attrs, namespaces)) = root else {
            return Err(Error::BodyParse("no root element".to_string()));
        };
        if !root_closed {
            return Err(Error::BodyParse("unclosed root element".to_string()));
        }
        let payload = match payload_span {
            Some((start, end)) => xml[start..end].to_string(),
            None => String::new(),
        };
        Ok(Body {
            attrs,
            namespaces,
            payload,
            raw: Some(xml.to_string()),
        })
    }
}

/// Two bodies are equal when their attributes, declared namespaces, and
/// payload match; the preserved raw text of parsed bodies does not
/// participate.
impl PartialEq for Body {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs
            && self.namespaces == other.namespaces
            && self.payload == other.payload
    }
}

impl Eq for Body {}

/// Extract attributes and namespace declarations from the root start tag.
fn parse_root_element(
    e: &BytesStart<'_>,
) -> Result<(BTreeMap<QName, String>, BTreeMap<String, String>)> {
    if e.name().as_ref() != b"body" {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        return Err(Error::BodyParse(format!(
            "root element is <{name}>, expected <body>"
        )));
    }

    // First pass: namespace declarations, which may appear after the
    // attributes that use them.
    let mut default_ns: Option<String> = None;
    let mut namespaces: BTreeMap<String, String> = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::BodyParse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::BodyParse(format!("invalid UTF-8 in attribute name: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::BodyParse(e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            default_ns = Some(value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.insert(prefix.to_string(), value);
        }
    }
    if default_ns.as_deref() != Some(BOSH_NS) {
        return Err(Error::BodyParse(format!(
            "root element is not in the {BOSH_NS} namespace"
        )));
    }

    // Second pass: the attributes themselves. Unprefixed attributes belong
    // to the wrapper's namespace.
    let mut attrs: BTreeMap<QName, String> = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::BodyParse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::BodyParse(format!("invalid UTF-8 in attribute name: {e}")))?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| Error::BodyParse(e.to_string()))?
            .into_owned();
        let name = match key.split_once(':') {
            None => QName::bosh(key),
            Some(("xml", local)) => QName::new(XML_NS, local),
            Some((prefix, local)) => {
                let Some(uri) = namespaces.get(prefix) else {
                    return Err(Error::BodyParse(format!(
                        "undeclared namespace prefix '{prefix}'"
                    )));
                };
                QName::new(uri.clone(), local)
            }
        };
        attrs.insert(name, value);
    }
    Ok((attrs, namespaces))
}

/// Builder deriving a new [`Body`] from attribute overrides.
///
/// All unmodified attributes, declared namespaces, and the payload carry
/// over from the source body.
#[derive(Debug, Clone)]
pub struct BodyBuilder {
    attrs: BTreeMap<QName, String>,
    namespaces: BTreeMap<String, String>,
    payload: String,
}

impl BodyBuilder {
    /// Set an attribute, or remove it by passing `None`.
    pub fn set_attribute(mut self, name: QName, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => {
                self.attrs.insert(name, v.into());
            }
            None => {
                self.attrs.remove(&name);
            }
        }
        self
    }

    /// Replace the payload XML fragment.
    pub fn set_payload_xml(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Declare a prefix-to-namespace binding on the wrapper element.
    pub fn set_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Finish composing the body.
    pub fn build(self) -> Body {
        Body {
            attrs: self.attrs,
            namespaces: self.namespaces,
            payload: self.payload,
            raw: None,
        }
    }
}
