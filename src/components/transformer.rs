//! Transformers
//!
//! Middle stages of an event pipeline. A transformer is a consumer that
//! forwards (possibly altered) events to the next stage.

use super::StageSetup;
use crate::error::ProcessingError;
use crate::xml::attributes::Attributes;
use crate::xml::consumer::{ContentHandler, LexicalHandler, TextPosition, XmlConsumer, XmlResult};
use crate::xml::pipe::XmlPipe;
use tracing::trace;

pub trait Transformer<'a>: XmlConsumer {
    fn set_consumer(&mut self, consumer: Box<dyn XmlConsumer + 'a>);
}

/// Creates one transformer instance per pipeline run
pub trait TransformerFactory: Send + Sync {
    fn create<'a>(&self, setup: &StageSetup) -> Result<Box<dyn Transformer<'a> + 'a>, ProcessingError>;
}

impl<'a> Transformer<'a> for XmlPipe<'a> {
    fn set_consumer(&mut self, consumer: Box<dyn XmlConsumer + 'a>) {
        XmlPipe::set_consumer(self, consumer)
    }
}

/// Passes events through unchanged
pub struct IdentityTransformerFactory;

impl TransformerFactory for IdentityTransformerFactory {
    fn create<'a>(&self, _setup: &StageSetup) -> Result<Box<dyn Transformer<'a> + 'a>, ProcessingError> {
        Ok(Box::new(XmlPipe::new()))
    }
}

/// Logs every event at trace level, labelled by the `label` parameter
pub struct TraceTransformerFactory;

impl TransformerFactory for TraceTransformerFactory {
    fn create<'a>(&self, setup: &StageSetup) -> Result<Box<dyn Transformer<'a> + 'a>, ProcessingError> {
        let label = setup
            .parameters
            .get("label")
            .cloned()
            .unwrap_or_else(|| "trace".to_string());
        Ok(Box::new(TraceTransformer {
            label,
            pipe: XmlPipe::new(),
        }))
    }
}

pub struct TraceTransformer<'a> {
    label: String,
    pipe: XmlPipe<'a>,
}

impl<'a> Transformer<'a> for TraceTransformer<'a> {
    fn set_consumer(&mut self, consumer: Box<dyn XmlConsumer + 'a>) {
        self.pipe.set_consumer(consumer)
    }
}

impl ContentHandler for TraceTransformer<'_> {
    fn position(&mut self, position: TextPosition) {
        self.pipe.position(position)
    }

    fn start_document(&mut self) -> XmlResult {
        trace!(label = %self.label, "start document");
        self.pipe.start_document()
    }

    fn end_document(&mut self) -> XmlResult {
        trace!(label = %self.label, "end document");
        self.pipe.end_document()
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
        trace!(label = %self.label, prefix, uri, "start prefix mapping");
        self.pipe.start_prefix_mapping(prefix, uri)
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> XmlResult {
        trace!(label = %self.label, prefix, "end prefix mapping");
        self.pipe.end_prefix_mapping(prefix)
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> XmlResult {
        trace!(label = %self.label, uri, qname, attributes = attributes.len(), "start element");
        self.pipe.start_element(uri, local_name, qname, attributes)
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> XmlResult {
        trace!(label = %self.label, uri, qname, "end element");
        self.pipe.end_element(uri, local_name, qname)
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        trace!(label = %self.label, text, "characters");
        self.pipe.characters(text)
    }

    fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
        self.pipe.ignorable_whitespace(text)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
        trace!(label = %self.label, target, data, "processing instruction");
        self.pipe.processing_instruction(target, data)
    }

    fn skipped_entity(&mut self, name: &str) -> XmlResult {
        self.pipe.skipped_entity(name)
    }
}

impl LexicalHandler for TraceTransformer<'_> {
    fn start_dtd(&mut self, name: &str, public_id: &str, system_id: &str) -> XmlResult {
        trace!(label = %self.label, name, "start dtd");
        self.pipe.start_dtd(name, public_id, system_id)
    }

    fn end_dtd(&mut self) -> XmlResult {
        self.pipe.end_dtd()
    }

    fn start_entity(&mut self, name: &str) -> XmlResult {
        self.pipe.start_entity(name)
    }

    fn end_entity(&mut self, name: &str) -> XmlResult {
        self.pipe.end_entity(name)
    }

    fn start_cdata(&mut self) -> XmlResult {
        trace!(label = %self.label, "start cdata");
        self.pipe.start_cdata()
    }

    fn end_cdata(&mut self) -> XmlResult {
        self.pipe.end_cdata()
    }

    fn comment(&mut self, text: &str) -> XmlResult {
        trace!(label = %self.label, text, "comment");
        self.pipe.comment(text)
    }
}

impl XmlConsumer for TraceTransformer<'_> {
    fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::consumer::testing::EventLog;
    use crate::xml::reader::parse_str;

    fn run(factory: &dyn TransformerFactory) -> Vec<String> {
        let mut log = EventLog::with_lexical();
        {
            let mut transformer = factory.create(&StageSetup::default()).unwrap();
            transformer.set_consumer(Box::new(&mut log));
            parse_str("<a><!--c-->t</a>", &mut *transformer).unwrap();
        }
        log.events
    }

    #[test]
    fn test_identity_and_trace_forward_everything() {
        let expected = vec![
            "start-document",
            "start {}a a []",
            "comment c",
            "chars t",
            "end {}a",
            "end-document",
        ];
        assert_eq!(run(&IdentityTransformerFactory), expected);
        assert_eq!(run(&TraceTransformerFactory), expected);
    }
}
