//! Recorded Markup Events
//!
//! One owned value per consumer callback. Character-bearing variants hold
//! their own copy of the text, so a recorded event never aliases the
//! producer's buffers.

use super::attributes::Attributes;
use super::consumer::{XmlConsumer, XmlResult};
use super::pipe::EmbeddedPipe;
use std::fmt;
use std::sync::Arc;

/// Something that can stream itself as markup events
///
/// Embedded fragments are stored behind this trait so a buffer can nest
/// another buffer (or any other producer) without copying its events.
pub trait Xmlizable: Send + Sync + fmt::Debug {
    /// Stream this object's events into the consumer
    fn to_sax(&self, consumer: &mut dyn XmlConsumer) -> XmlResult;

    /// Write a debug rendering at the given nesting depth
    fn dump(&self, out: &mut dyn fmt::Write, depth: usize) -> fmt::Result {
        writeln!(out, "{}[XMLizable] xmlizable={:?}", indent(depth), self)
    }
}

/// A single recorded event
#[derive(Debug, Clone)]
pub enum SaxEvent {
    StartDocument,
    EndDocument,
    StartElement {
        uri: String,
        local_name: String,
        qname: String,
        attributes: Attributes,
    },
    EndElement {
        uri: String,
        local_name: String,
        qname: String,
    },
    Characters(String),
    IgnorableWhitespace(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
    StartPrefixMapping {
        prefix: String,
        uri: String,
    },
    EndPrefixMapping(String),
    StartEntity(String),
    EndEntity(String),
    SkippedEntity(String),
    StartCdata,
    EndCdata,
    StartDtd {
        name: String,
        public_id: String,
        system_id: String,
    },
    EndDtd,
    /// A nested producer replayed in place, without its document boundaries
    Embedded(Arc<dyn Xmlizable>),
}

impl SaxEvent {
    /// True for events delivered on the lexical channel only
    pub fn is_lexical(&self) -> bool {
        matches!(
            self,
            SaxEvent::Comment(_)
                | SaxEvent::StartEntity(_)
                | SaxEvent::EndEntity(_)
                | SaxEvent::StartCdata
                | SaxEvent::EndCdata
                | SaxEvent::StartDtd { .. }
                | SaxEvent::EndDtd
        )
    }

    /// Deliver this event to a consumer.
    ///
    /// Lexical events are skipped for consumers that do not expose a lexical
    /// channel; this is not an error.
    pub fn send(&self, consumer: &mut dyn XmlConsumer) -> XmlResult {
        match self {
            SaxEvent::StartDocument => consumer.start_document(),
            SaxEvent::EndDocument => consumer.end_document(),
            SaxEvent::StartElement {
                uri,
                local_name,
                qname,
                attributes,
            } => consumer.start_element(uri, local_name, qname, attributes),
            SaxEvent::EndElement {
                uri,
                local_name,
                qname,
            } => consumer.end_element(uri, local_name, qname),
            SaxEvent::Characters(text) => consumer.characters(text),
            SaxEvent::IgnorableWhitespace(text) => consumer.ignorable_whitespace(text),
            SaxEvent::ProcessingInstruction { target, data } => {
                consumer.processing_instruction(target, data)
            }
            SaxEvent::StartPrefixMapping { prefix, uri } => {
                consumer.start_prefix_mapping(prefix, uri)
            }
            SaxEvent::EndPrefixMapping(prefix) => consumer.end_prefix_mapping(prefix),
            SaxEvent::SkippedEntity(name) => consumer.skipped_entity(name),
            SaxEvent::Embedded(fragment) => fragment.to_sax(&mut EmbeddedPipe::new(consumer)),
            lexical => match consumer.lexical_handler() {
                Some(handler) => match lexical {
                    SaxEvent::Comment(text) => handler.comment(text),
                    SaxEvent::StartEntity(name) => handler.start_entity(name),
                    SaxEvent::EndEntity(name) => handler.end_entity(name),
                    SaxEvent::StartCdata => handler.start_cdata(),
                    SaxEvent::EndCdata => handler.end_cdata(),
                    SaxEvent::StartDtd {
                        name,
                        public_id,
                        system_id,
                    } => handler.start_dtd(name, public_id, system_id),
                    SaxEvent::EndDtd => handler.end_dtd(),
                    _ => Ok(()),
                },
                None => Ok(()),
            },
        }
    }

    /// Write the one-line debug rendering of this event (nested fragments span several lines)
    pub fn dump(&self, out: &mut dyn fmt::Write, depth: usize) -> fmt::Result {
        let pad = indent(depth);
        match self {
            SaxEvent::StartDocument => writeln!(out, "{pad}[StartDocument]"),
            SaxEvent::EndDocument => writeln!(out, "{pad}[EndDocument]"),
            SaxEvent::StartElement {
                uri,
                local_name,
                qname,
                attributes,
            } => {
                writeln!(
                    out,
                    "{pad}[StartElement] namespaceURI={uri},localName={local_name},qName={qname}"
                )?;
                for attr in attributes {
                    writeln!(
                        out,
                        "{pad}      [Attribute] namespaceURI={},localName={},qName={},value={}",
                        attr.uri, attr.local_name, attr.qname, attr.value
                    )?;
                }
                Ok(())
            }
            SaxEvent::EndElement {
                uri,
                local_name,
                qname,
            } => writeln!(
                out,
                "{pad}[EndElement] namespaceURI={uri},localName={local_name},qName={qname}"
            ),
            SaxEvent::Characters(text) => writeln!(out, "{pad}[Characters] ch={text}"),
            SaxEvent::IgnorableWhitespace(text) => {
                writeln!(out, "{pad}[IgnorableWhitespace] ch={text}")
            }
            SaxEvent::Comment(text) => writeln!(out, "{pad}[Comment] ch={text}"),
            SaxEvent::ProcessingInstruction { target, data } => {
                writeln!(out, "{pad}[ProcessingInstruction] target={target},data={data}")
            }
            SaxEvent::StartPrefixMapping { prefix, uri } => {
                writeln!(out, "{pad}[StartPrefixMapping] prefix={prefix},uri={uri}")
            }
            SaxEvent::EndPrefixMapping(prefix) => {
                writeln!(out, "{pad}[EndPrefixMapping] prefix={prefix}")
            }
            SaxEvent::StartEntity(name) => writeln!(out, "{pad}[StartEntity] name={name}"),
            SaxEvent::EndEntity(name) => writeln!(out, "{pad}[EndEntity] name={name}"),
            SaxEvent::SkippedEntity(name) => writeln!(out, "{pad}[SkippedEntity] name={name}"),
            SaxEvent::StartCdata => writeln!(out, "{pad}[StartCDATA]"),
            SaxEvent::EndCdata => writeln!(out, "{pad}[EndCDATA]"),
            SaxEvent::StartDtd {
                name,
                public_id,
                system_id,
            } => writeln!(
                out,
                "{pad}[StartDTD] name={name},publicId={public_id},systemId={system_id}"
            ),
            SaxEvent::EndDtd => writeln!(out, "{pad}[EndDTD]"),
            SaxEvent::Embedded(fragment) => fragment.dump(out, depth),
        }
    }
}

impl PartialEq for SaxEvent {
    fn eq(&self, other: &Self) -> bool {
        use SaxEvent::*;
        match (self, other) {
            (StartDocument, StartDocument)
            | (EndDocument, EndDocument)
            | (StartCdata, StartCdata)
            | (EndCdata, EndCdata)
            | (EndDtd, EndDtd) => true,
            (
                StartElement {
                    uri: u1,
                    local_name: l1,
                    qname: q1,
                    attributes: a1,
                },
                StartElement {
                    uri: u2,
                    local_name: l2,
                    qname: q2,
                    attributes: a2,
                },
            ) => u1 == u2 && l1 == l2 && q1 == q2 && a1 == a2,
            (
                EndElement {
                    uri: u1,
                    local_name: l1,
                    qname: q1,
                },
                EndElement {
                    uri: u2,
                    local_name: l2,
                    qname: q2,
                },
            ) => u1 == u2 && l1 == l2 && q1 == q2,
            (Characters(a), Characters(b))
            | (IgnorableWhitespace(a), IgnorableWhitespace(b))
            | (Comment(a), Comment(b))
            | (EndPrefixMapping(a), EndPrefixMapping(b))
            | (StartEntity(a), StartEntity(b))
            | (EndEntity(a), EndEntity(b))
            | (SkippedEntity(a), SkippedEntity(b)) => a == b,
            (
                ProcessingInstruction { target: t1, data: d1 },
                ProcessingInstruction { target: t2, data: d2 },
            ) => t1 == t2 && d1 == d2,
            (
                StartPrefixMapping { prefix: p1, uri: u1 },
                StartPrefixMapping { prefix: p2, uri: u2 },
            ) => p1 == p2 && u1 == u2,
            (
                StartDtd {
                    name: n1,
                    public_id: p1,
                    system_id: s1,
                },
                StartDtd {
                    name: n2,
                    public_id: p2,
                    system_id: s2,
                },
            ) => n1 == n2 && p1 == p2 && s1 == s2,
            // Embedded fragments compare by identity
            (Embedded(a), Embedded(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Indentation prefix for a nesting depth
pub(crate) fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
