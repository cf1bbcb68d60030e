//! Streaming Markup Reader
//!
//! Scans UTF-8 markup with the memchr-based `Scanner` and drives an
//! `XmlConsumer` with fully owned, namespace-resolved events:
//!
//! ```text
//! bytes ---> Scanner ---> XmlReader ---> XmlConsumer (content channel)
//!                             |
//!                             +--------> LexicalHandler (if supported)
//! ```
//!
//! Unlike a lenient tag scanner, the reader rejects documents that are not
//! well-formed (mismatched or unclosed tags, unbound prefixes) since its
//! main client is the configuration compiler.

use super::attributes::{split_name, Attributes};
use super::consumer::{TextPosition, XmlConsumer, XmlResult};
use super::entities::decode_text;
use super::namespace::NamespaceResolver;
use super::scanner::{is_name_start_char, LineTracker, Scanner};
use crate::error::XmlError;

/// Parse a complete document into the consumer
pub fn parse(input: &[u8], consumer: &mut dyn XmlConsumer) -> XmlResult {
    let text = std::str::from_utf8(input).map_err(|e| XmlError::Malformed {
        message: format!("input is not valid UTF-8: {}", e),
        line: 1,
        column: 1,
    })?;
    XmlReader::new(text).read(consumer)
}

/// Parse a complete document held in a string
pub fn parse_str(input: &str, consumer: &mut dyn XmlConsumer) -> XmlResult {
    XmlReader::new(input).read(consumer)
}

/// Element left open by a start tag
struct OpenElement<'a> {
    qname: &'a str,
    local_name: &'a str,
    uri: String,
}

/// Single-use reader over one document
pub struct XmlReader<'a> {
    text: &'a str,
    scanner: Scanner<'a>,
    lines: LineTracker,
    namespaces: NamespaceResolver,
    open: Vec<OpenElement<'a>>,
    seen_root: bool,
    /// Reusable raw attribute buffer to avoid per-element allocations
    raw_attrs: Vec<(&'a str, &'a str)>,
}

impl<'a> XmlReader<'a> {
    pub fn new(text: &'a str) -> Self {
        XmlReader {
            text,
            scanner: Scanner::new(text.as_bytes()),
            lines: LineTracker::new(),
            namespaces: NamespaceResolver::new(),
            open: Vec::with_capacity(16),
            seen_root: false,
            raw_attrs: Vec::with_capacity(8),
        }
    }

    /// Read the whole document, emitting StartDocument and EndDocument around it
    pub fn read(mut self, consumer: &mut dyn XmlConsumer) -> XmlResult {
        consumer.start_document()?;

        while !self.scanner.is_eof() {
            match self.scanner.peek() {
                Some(b'<') => self.scan_markup(consumer)?,
                Some(_) => self.scan_text(consumer)?,
                None => break,
            }
        }

        if let Some(open) = self.open.last() {
            let message = format!("unclosed element <{}>", open.qname);
            return Err(self.malformed(self.text.len(), message));
        }
        if !self.seen_root {
            return Err(self.malformed(self.text.len(), "document has no root element"));
        }

        consumer.end_document()
    }

    fn malformed<S: Into<String>>(&mut self, offset: usize, message: S) -> XmlError {
        let (line, column) = self.lines.locate(self.text.as_bytes(), offset);
        XmlError::Malformed {
            message: message.into(),
            line,
            column,
        }
    }

    #[inline]
    fn str_at(&self, start: usize, end: usize) -> &'a str {
        self.text.get(start..end).unwrap_or("")
    }

    #[inline]
    fn bytes_as_str(&self, bytes: &'a [u8]) -> &'a str {
        std::str::from_utf8(bytes).unwrap_or("")
    }

    /// Scan markup starting with '<'
    fn scan_markup(&mut self, consumer: &mut dyn XmlConsumer) -> XmlResult {
        let start = self.scanner.position();

        if self.scanner.starts_with(b"</") {
            self.scanner.advance(2);
            self.scan_end_tag(start, consumer)
        } else if self.scanner.starts_with(b"<!--") {
            self.scanner.advance(4);
            self.scan_comment(start, consumer)
        } else if self.scanner.starts_with(b"<![CDATA[") {
            self.scanner.advance(9);
            self.scan_cdata(start, consumer)
        } else if self.scanner.starts_with(b"<!DOCTYPE") || self.scanner.starts_with(b"<!doctype") {
            self.scanner.advance(9);
            self.scan_doctype(start, consumer)
        } else if self.scanner.starts_with(b"<?") {
            self.scanner.advance(2);
            self.scan_pi(start, consumer)
        } else if self.scanner.peek_at(1).is_some_and(is_name_start_char) {
            self.scan_start_tag(start, consumer)
        } else {
            Err(self.malformed(start, "invalid markup"))
        }
    }

    /// Scan a start tag (or empty-element tag)
    fn scan_start_tag(&mut self, start: usize, consumer: &mut dyn XmlConsumer) -> XmlResult {
        if self.open.is_empty() && self.seen_root {
            return Err(self.malformed(start, "content after the root element"));
        }

        self.scanner.advance(1); // Skip '<'
        let qname = match self.scanner.read_name() {
            Some(name) => self.bytes_as_str(name),
            None => return Err(self.malformed(start, "missing element name")),
        };

        self.raw_attrs.clear();
        let is_empty = loop {
            self.scanner.skip_whitespace();
            match self.scanner.peek() {
                Some(b'>') => {
                    self.scanner.advance(1);
                    break false;
                }
                Some(b'/') if self.scanner.peek_at(1) == Some(b'>') => {
                    self.scanner.advance(2);
                    break true;
                }
                Some(c) if is_name_start_char(c) => {
                    let attr = self.scan_attribute();
                    match attr {
                        Some(pair) => self.raw_attrs.push(pair),
                        None => {
                            let message = format!("malformed attribute in <{}>", qname);
                            return Err(self.malformed(start, message));
                        }
                    }
                }
                _ => {
                    let message = format!("malformed start tag <{}>", qname);
                    return Err(self.malformed(start, message));
                }
            }
        };

        // Namespace declarations first, so the element and its attributes can use them
        self.namespaces.push_scope();
        for i in 0..self.raw_attrs.len() {
            let (name, value) = self.raw_attrs[i];
            let prefix = if name == "xmlns" {
                ""
            } else if let Some(p) = name.strip_prefix("xmlns:") {
                p
            } else {
                continue;
            };
            let uri = decode_text(value);
            if self.namespaces.declare(prefix, &uri) {
                consumer.start_prefix_mapping(prefix, &uri)?;
            }
        }

        let (prefix, local_name) = split_name(qname);
        let uri = match self.namespaces.resolve(prefix.unwrap_or("")).map(str::to_string) {
            Some(uri) => uri,
            None if prefix.is_none() => String::new(),
            None => {
                let message = format!("unbound namespace prefix in <{}>", qname);
                return Err(self.malformed(start, message));
            }
        };

        let mut attributes = Attributes::new();
        for i in 0..self.raw_attrs.len() {
            let (name, value) = self.raw_attrs[i];
            if name == "xmlns" || name.starts_with("xmlns:") {
                continue;
            }
            let (attr_prefix, attr_local) = split_name(name);
            let attr_uri = match attr_prefix {
                None => String::new(),
                Some(p) => match self.namespaces.resolve(p).map(str::to_string) {
                    Some(uri) => uri,
                    None => {
                        let message = format!("unbound namespace prefix on attribute {}", name);
                        return Err(self.malformed(start, message));
                    }
                },
            };
            attributes.push(&attr_uri, attr_local, name, &decode_text(value));
        }

        let (line, column) = self.lines.locate(self.text.as_bytes(), start);
        consumer.position(TextPosition { line, column });
        consumer.start_element(&uri, local_name, qname, &attributes)?;
        self.seen_root = true;

        if is_empty {
            consumer.end_element(&uri, local_name, qname)?;
            for ended in self.namespaces.pop_scope() {
                consumer.end_prefix_mapping(&ended)?;
            }
        } else {
            self.open.push(OpenElement {
                qname,
                local_name,
                uri,
            });
        }
        Ok(())
    }

    /// Scan an attribute, returning (name, raw value)
    fn scan_attribute(&mut self) -> Option<(&'a str, &'a str)> {
        let name = self.scanner.read_name()?;
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'=') {
            return None;
        }
        self.scanner.advance(1);
        self.scanner.skip_whitespace();
        let value = self.scanner.read_quoted()?;
        Some((self.bytes_as_str(name), self.bytes_as_str(value)))
    }

    /// Scan an end tag
    fn scan_end_tag(&mut self, start: usize, consumer: &mut dyn XmlConsumer) -> XmlResult {
        let qname = match self.scanner.read_name() {
            Some(name) => self.bytes_as_str(name),
            None => return Err(self.malformed(start, "missing name in end tag")),
        };
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'>') {
            let message = format!("malformed end tag </{}>", qname);
            return Err(self.malformed(start, message));
        }
        self.scanner.advance(1);

        let Some(open) = self.open.pop() else {
            let message = format!("unexpected end tag </{}>", qname);
            return Err(self.malformed(start, message));
        };
        if open.qname != qname {
            let message = format!(
                "mismatched end tag: expected </{}>, found </{}>",
                open.qname, qname
            );
            return Err(self.malformed(start, message));
        }

        consumer.end_element(&open.uri, open.local_name, open.qname)?;
        for ended in self.namespaces.pop_scope() {
            consumer.end_prefix_mapping(&ended)?;
        }
        Ok(())
    }

    /// Scan text content up to the next '<'
    fn scan_text(&mut self, consumer: &mut dyn XmlConsumer) -> XmlResult {
        let start = self.scanner.position();
        let end = self.scanner.find_tag_start().unwrap_or(self.text.len());
        self.scanner.set_position(end);
        let raw = self.str_at(start, end);

        if self.open.is_empty() {
            if raw.trim().is_empty() {
                return Ok(());
            }
            return Err(self.malformed(start, "text outside the root element"));
        }
        consumer.characters(&decode_text(raw))
    }

    /// Scan a comment; lexical-only, skipped for consumers without that capability
    fn scan_comment(&mut self, start: usize, consumer: &mut dyn XmlConsumer) -> XmlResult {
        let content_start = self.scanner.position();
        let Some(end) = self.scanner.find_seq(b"-->") else {
            return Err(self.malformed(start, "unterminated comment"));
        };
        self.scanner.set_position(end + 3);
        let content = self.str_at(content_start, end);
        if let Some(lexical) = consumer.lexical_handler() {
            lexical.comment(content)?;
        }
        Ok(())
    }

    /// Scan a CDATA section: the content is always delivered as characters,
    /// the section boundaries only on the lexical channel
    fn scan_cdata(&mut self, start: usize, consumer: &mut dyn XmlConsumer) -> XmlResult {
        let content_start = self.scanner.position();
        let Some(end) = self.scanner.find_seq(b"]]>") else {
            return Err(self.malformed(start, "unterminated CDATA section"));
        };
        self.scanner.set_position(end + 3);
        let content = self.str_at(content_start, end);

        if let Some(lexical) = consumer.lexical_handler() {
            lexical.start_cdata()?;
        }
        consumer.characters(content)?;
        if let Some(lexical) = consumer.lexical_handler() {
            lexical.end_cdata()?;
        }
        Ok(())
    }

    /// Scan a processing instruction; the XML declaration is consumed silently
    fn scan_pi(&mut self, start: usize, consumer: &mut dyn XmlConsumer) -> XmlResult {
        let target = match self.scanner.read_name() {
            Some(name) => self.bytes_as_str(name),
            None => return Err(self.malformed(start, "missing processing instruction target")),
        };
        self.scanner.skip_whitespace();
        let data_start = self.scanner.position();
        let Some(end) = self.scanner.find_seq(b"?>") else {
            return Err(self.malformed(start, "unterminated processing instruction"));
        };
        self.scanner.set_position(end + 2);

        if target.eq_ignore_ascii_case("xml") {
            return Ok(());
        }
        let data = self.str_at(data_start, end).trim_end();
        consumer.processing_instruction(target, data)
    }

    /// Scan DOCTYPE, reporting its name and external identifiers
    fn scan_doctype(&mut self, start: usize, consumer: &mut dyn XmlConsumer) -> XmlResult {
        self.scanner.skip_whitespace();
        let name = match self.scanner.read_name() {
            Some(name) => self.bytes_as_str(name),
            None => return Err(self.malformed(start, "missing DOCTYPE name")),
        };
        self.scanner.skip_whitespace();

        let mut public_id = "";
        let mut system_id = "";
        if self.scanner.starts_with(b"PUBLIC") {
            self.scanner.advance(6);
            self.scanner.skip_whitespace();
            public_id = self.scanner.read_quoted().map(|b| self.bytes_as_str(b)).unwrap_or("");
            self.scanner.skip_whitespace();
            system_id = self.scanner.read_quoted().map(|b| self.bytes_as_str(b)).unwrap_or("");
        } else if self.scanner.starts_with(b"SYSTEM") {
            self.scanner.advance(6);
            self.scanner.skip_whitespace();
            system_id = self.scanner.read_quoted().map(|b| self.bytes_as_str(b)).unwrap_or("");
        }

        // Find end of DOCTYPE, handling internal subset
        let mut depth = 0usize;
        loop {
            match self.scanner.peek() {
                Some(b'[') => depth += 1,
                Some(b']') => depth = depth.saturating_sub(1),
                Some(b'>') if depth == 0 => {
                    self.scanner.advance(1);
                    break;
                }
                Some(_) => {}
                None => return Err(self.malformed(start, "unterminated DOCTYPE")),
            }
            self.scanner.advance(1);
        }

        if let Some(lexical) = consumer.lexical_handler() {
            lexical.start_dtd(name, public_id, system_id)?;
            lexical.end_dtd()?;
        }
        Ok(())
    }
}
