//! Serializer stages

use super::StageSetup;
use crate::xml::consumer::XmlConsumer;
use crate::xml::serializer::{TextSerializer, XmlSerializer};

pub trait SerializerFactory: Send + Sync {
    /// A serializer writing into `out`
    fn create<'a>(&self, out: &'a mut Vec<u8>, setup: &StageSetup) -> Box<dyn XmlConsumer + 'a>;

    /// Content type used when the sitemap names none
    fn mime_type(&self) -> &str;
}

/// `omit-xml-declaration` parameter: `yes`/`true` suppresses the declaration
pub struct XmlSerializerFactory;

impl SerializerFactory for XmlSerializerFactory {
    fn create<'a>(&self, out: &'a mut Vec<u8>, setup: &StageSetup) -> Box<dyn XmlConsumer + 'a> {
        let omit = matches!(
            setup.parameters.get("omit-xml-declaration").map(String::as_str),
            Some("yes" | "true")
        );
        Box::new(XmlSerializer::new(out).omit_xml_declaration(omit))
    }

    fn mime_type(&self) -> &str {
        "text/xml"
    }
}

pub struct TextSerializerFactory;

impl SerializerFactory for TextSerializerFactory {
    fn create<'a>(&self, out: &'a mut Vec<u8>, _setup: &StageSetup) -> Box<dyn XmlConsumer + 'a> {
        Box::new(TextSerializer::new(out))
    }

    fn mime_type(&self) -> &str {
        "text/plain"
    }
}
