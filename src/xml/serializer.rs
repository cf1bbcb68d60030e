//! Event Serializers
//!
//! Terminal consumers that turn an event stream back into bytes.
//! `XmlSerializer` writes markup; `TextSerializer` writes character data only.

use super::attributes::Attributes;
use super::consumer::{ContentHandler, LexicalHandler, XmlConsumer, XmlResult};
use super::entities::{escape_attribute, escape_text};
use std::io::Write;

/// Writes escaped XML for the events it receives.
///
/// Elements with no content collapse to `<name/>`. Prefix mappings are
/// written as `xmlns` declarations on the next start tag.
pub struct XmlSerializer<W: Write> {
    out: W,
    omit_xml_declaration: bool,
    /// A start tag has been written without its closing `>`
    open_tag: bool,
    pending_ns: Vec<(String, String)>,
    in_cdata: bool,
}

impl<W: Write> XmlSerializer<W> {
    pub fn new(out: W) -> Self {
        XmlSerializer {
            out,
            omit_xml_declaration: false,
            open_tag: false,
            pending_ns: Vec::new(),
            in_cdata: false,
        }
    }

    /// Suppress the `<?xml ...?>` declaration on StartDocument
    pub fn omit_xml_declaration(mut self, omit: bool) -> Self {
        self.omit_xml_declaration = omit;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    #[inline]
    fn close_open_tag(&mut self) -> XmlResult {
        if self.open_tag {
            self.open_tag = false;
            self.out.write_all(b">")?;
        }
        Ok(())
    }
}

impl<W: Write> ContentHandler for XmlSerializer<W> {
    fn start_document(&mut self) -> XmlResult {
        if !self.omit_xml_declaration {
            self.out
                .write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> XmlResult {
        self.close_open_tag()?;
        self.out.flush()?;
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
        self.pending_ns.push((prefix.to_string(), uri.to_string()));
        Ok(())
    }

    fn start_element(
        &mut self,
        _uri: &str,
        _local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> XmlResult {
        self.close_open_tag()?;
        write!(self.out, "<{}", qname)?;
        for (prefix, uri) in self.pending_ns.drain(..) {
            if prefix.is_empty() {
                write!(self.out, " xmlns=\"{}\"", escape_attribute(&uri))?;
            } else {
                write!(self.out, " xmlns:{}=\"{}\"", prefix, escape_attribute(&uri))?;
            }
        }
        for attr in attributes {
            write!(self.out, " {}=\"{}\"", attr.qname, escape_attribute(&attr.value))?;
        }
        self.open_tag = true;
        Ok(())
    }

    fn end_element(&mut self, _uri: &str, _local_name: &str, qname: &str) -> XmlResult {
        if self.open_tag {
            self.open_tag = false;
            self.out.write_all(b"/>")?;
        } else {
            write!(self.out, "</{}>", qname)?;
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        if text.is_empty() {
            return Ok(());
        }
        self.close_open_tag()?;
        if self.in_cdata {
            self.out.write_all(text.as_bytes())?;
        } else {
            self.out.write_all(escape_text(text).as_bytes())?;
        }
        Ok(())
    }

    fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
        self.close_open_tag()?;
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
        self.close_open_tag()?;
        if data.is_empty() {
            write!(self.out, "<?{}?>", target)?;
        } else {
            write!(self.out, "<?{} {}?>", target, data)?;
        }
        Ok(())
    }

    fn skipped_entity(&mut self, name: &str) -> XmlResult {
        self.close_open_tag()?;
        write!(self.out, "&{};", name)?;
        Ok(())
    }
}

impl<W: Write> LexicalHandler for XmlSerializer<W> {
    fn start_dtd(&mut self, name: &str, public_id: &str, system_id: &str) -> XmlResult {
        write!(self.out, "<!DOCTYPE {}", name)?;
        if !public_id.is_empty() {
            write!(self.out, " PUBLIC \"{}\" \"{}\"", public_id, system_id)?;
        } else if !system_id.is_empty() {
            write!(self.out, " SYSTEM \"{}\"", system_id)?;
        }
        self.out.write_all(b">")?;
        Ok(())
    }

    fn end_dtd(&mut self) -> XmlResult {
        Ok(())
    }

    fn start_entity(&mut self, _name: &str) -> XmlResult {
        Ok(())
    }

    fn end_entity(&mut self, _name: &str) -> XmlResult {
        Ok(())
    }

    fn start_cdata(&mut self) -> XmlResult {
        self.close_open_tag()?;
        self.in_cdata = true;
        self.out.write_all(b"<![CDATA[")?;
        Ok(())
    }

    fn end_cdata(&mut self) -> XmlResult {
        self.in_cdata = false;
        self.out.write_all(b"]]>")?;
        Ok(())
    }

    fn comment(&mut self, text: &str) -> XmlResult {
        self.close_open_tag()?;
        write!(self.out, "<!--{}-->", text)?;
        Ok(())
    }
}

impl<W: Write> XmlConsumer for XmlSerializer<W> {
    fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
        Some(self)
    }
}

/// Writes the character data of a stream, dropping all markup
pub struct TextSerializer<W: Write> {
    out: W,
}

impl<W: Write> TextSerializer<W> {
    pub fn new(out: W) -> Self {
        TextSerializer { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ContentHandler for TextSerializer<W> {
    fn end_document(&mut self) -> XmlResult {
        self.out.flush()?;
        Ok(())
    }

    fn start_element(&mut self, _: &str, _: &str, _: &str, _: &Attributes) -> XmlResult {
        Ok(())
    }

    fn end_element(&mut self, _: &str, _: &str, _: &str) -> XmlResult {
        Ok(())
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl<W: Write> XmlConsumer for TextSerializer<W> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::reader::parse_str;

    fn serialize(input: &str) -> String {
        let mut serializer = XmlSerializer::new(Vec::new()).omit_xml_declaration(true);
        parse_str(input, &mut serializer).unwrap();
        String::from_utf8(serializer.into_inner()).unwrap()
    }

    #[test]
    fn test_collapses_empty_elements() {
        assert_eq!(serialize("<a><b></b><c>x</c></a>"), "<a><b/><c>x</c></a>");
    }

    #[test]
    fn test_escapes_text_and_attributes() {
        assert_eq!(
            serialize(r#"<a t="&quot;1&lt;2&quot;">x &amp; y</a>"#),
            r#"<a t="&quot;1&lt;2&quot;">x &amp; y</a>"#
        );
    }

    #[test]
    fn test_namespace_declarations_restored() {
        assert_eq!(
            serialize(r#"<m:a xmlns:m="urn:m" xmlns="urn:d"><b/></m:a>"#),
            r#"<m:a xmlns:m="urn:m" xmlns="urn:d"><b/></m:a>"#
        );
    }

    #[test]
    fn test_lexical_constructs() {
        assert_eq!(
            serialize("<a><!--note--><![CDATA[<raw>]]><?pi data?></a>"),
            "<a><!--note--><![CDATA[<raw>]]><?pi data?></a>"
        );
    }

    #[test]
    fn test_declaration_written_by_default() {
        let mut serializer = XmlSerializer::new(Vec::new());
        parse_str("<a/>", &mut serializer).unwrap();
        let out = String::from_utf8(serializer.into_inner()).unwrap();
        assert_eq!(out, r#"<?xml version="1.0" encoding="UTF-8"?><a/>"#);
    }

    #[test]
    fn test_text_serializer() {
        let mut serializer = TextSerializer::new(Vec::new());
        parse_str("<a>one <b>two</b><!--no--> three</a>", &mut serializer).unwrap();
        assert_eq!(serializer.into_inner(), b"one two three");
    }
}
