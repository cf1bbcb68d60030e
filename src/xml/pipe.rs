//! Event Pipe Chain
//!
//! Pipes are consumers that forward events downstream:
//!
//! ```text
//! producer ---> XmlPipe ---> XmlPipe ---> consumer
//!                  |
//!                  +--> TeePipe ---> first
//!                            \-----> second
//! ```
//!
//! A pipe keeps two channels. `set_consumer` wires both to one endpoint, with
//! lexical events reaching it only if it exposes a lexical handler;
//! `set_content_handler` / `set_lexical_handler` wire them independently.
//! An unwired channel drops events silently.

use super::attributes::Attributes;
use super::consumer::{ContentHandler, LexicalHandler, TextPosition, XmlConsumer, XmlResult};

/// Where a pipe forwards its events
#[derive(Default)]
enum Downstream<'a> {
    /// Terminal: events are discarded
    #[default]
    Terminal,
    /// One endpoint for both channels
    Consumer(Box<dyn XmlConsumer + 'a>),
    /// Independently wired channels
    Split {
        content: Option<Box<dyn ContentHandler + 'a>>,
        lexical: Option<Box<dyn LexicalHandler + 'a>>,
    },
}

/// Pass-through link of an event chain
#[derive(Default)]
pub struct XmlPipe<'a> {
    downstream: Downstream<'a>,
}

impl<'a> XmlPipe<'a> {
    pub fn new() -> Self {
        XmlPipe {
            downstream: Downstream::Terminal,
        }
    }

    /// Create a pipe already wired to a consumer
    pub fn to(consumer: Box<dyn XmlConsumer + 'a>) -> Self {
        XmlPipe {
            downstream: Downstream::Consumer(consumer),
        }
    }

    /// Wire both channels to one consumer
    pub fn set_consumer(&mut self, consumer: Box<dyn XmlConsumer + 'a>) {
        self.downstream = Downstream::Consumer(consumer);
    }

    /// Wire the content channel only, keeping any separately wired lexical handler
    pub fn set_content_handler(&mut self, handler: Box<dyn ContentHandler + 'a>) {
        let lexical = match std::mem::take(&mut self.downstream) {
            Downstream::Split { lexical, .. } => lexical,
            _ => None,
        };
        self.downstream = Downstream::Split {
            content: Some(handler),
            lexical,
        };
    }

    /// Wire the lexical channel only, keeping any separately wired content handler
    pub fn set_lexical_handler(&mut self, handler: Box<dyn LexicalHandler + 'a>) {
        let content = match std::mem::take(&mut self.downstream) {
            Downstream::Split { content, .. } => content,
            _ => None,
        };
        self.downstream = Downstream::Split {
            content,
            lexical: Some(handler),
        };
    }

    /// Drop all downstream references so the pipe can be pooled and reused
    pub fn recycle(&mut self) {
        self.downstream = Downstream::Terminal;
    }

    pub fn has_consumer(&self) -> bool {
        !matches!(self.downstream, Downstream::Terminal)
    }

    /// Take back a consumer wired with `set_consumer`, leaving the pipe terminal
    pub fn take_consumer(&mut self) -> Option<Box<dyn XmlConsumer + 'a>> {
        match std::mem::take(&mut self.downstream) {
            Downstream::Consumer(consumer) => Some(consumer),
            other => {
                self.downstream = other;
                None
            }
        }
    }

    fn content(&mut self) -> Option<&mut (dyn ContentHandler + 'a)> {
        match &mut self.downstream {
            Downstream::Terminal => None,
            Downstream::Consumer(consumer) => Some(consumer.as_mut()),
            Downstream::Split { content, .. } => content.as_deref_mut(),
        }
    }

    fn lexical(&mut self) -> Option<&mut dyn LexicalHandler> {
        match &mut self.downstream {
            Downstream::Terminal => None,
            Downstream::Consumer(consumer) => consumer.lexical_handler(),
            Downstream::Split { lexical, .. } => match lexical {
                Some(handler) => Some(handler.as_mut()),
                None => None,
            },
        }
    }
}

impl ContentHandler for XmlPipe<'_> {
    fn position(&mut self, position: TextPosition) {
        if let Some(next) = self.content() {
            next.position(position);
        }
    }

    fn start_document(&mut self) -> XmlResult {
        self.content().map_or(Ok(()), |next| next.start_document())
    }

    fn end_document(&mut self) -> XmlResult {
        self.content().map_or(Ok(()), |next| next.end_document())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
        self.content()
            .map_or(Ok(()), |next| next.start_prefix_mapping(prefix, uri))
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> XmlResult {
        self.content()
            .map_or(Ok(()), |next| next.end_prefix_mapping(prefix))
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> XmlResult {
        self.content().map_or(Ok(()), |next| {
            next.start_element(uri, local_name, qname, attributes)
        })
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> XmlResult {
        self.content()
            .map_or(Ok(()), |next| next.end_element(uri, local_name, qname))
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        self.content().map_or(Ok(()), |next| next.characters(text))
    }

    fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
        self.content()
            .map_or(Ok(()), |next| next.ignorable_whitespace(text))
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
        self.content()
            .map_or(Ok(()), |next| next.processing_instruction(target, data))
    }

    fn skipped_entity(&mut self, name: &str) -> XmlResult {
        self.content().map_or(Ok(()), |next| next.skipped_entity(name))
    }
}

impl LexicalHandler for XmlPipe<'_> {
    fn start_dtd(&mut self, name: &str, public_id: &str, system_id: &str) -> XmlResult {
        self.lexical()
            .map_or(Ok(()), |next| next.start_dtd(name, public_id, system_id))
    }

    fn end_dtd(&mut self) -> XmlResult {
        self.lexical().map_or(Ok(()), |next| next.end_dtd())
    }

    fn start_entity(&mut self, name: &str) -> XmlResult {
        self.lexical().map_or(Ok(()), |next| next.start_entity(name))
    }

    fn end_entity(&mut self, name: &str) -> XmlResult {
        self.lexical().map_or(Ok(()), |next| next.end_entity(name))
    }

    fn start_cdata(&mut self) -> XmlResult {
        self.lexical().map_or(Ok(()), |next| next.start_cdata())
    }

    fn end_cdata(&mut self) -> XmlResult {
        self.lexical().map_or(Ok(()), |next| next.end_cdata())
    }

    fn comment(&mut self, text: &str) -> XmlResult {
        self.lexical().map_or(Ok(()), |next| next.comment(text))
    }
}

impl XmlConsumer for XmlPipe<'_> {
    fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
        Some(self)
    }
}

/// Fan-out: every event goes to `first`, then to `second`.
///
/// An error from `first` is returned immediately and `second` does not see
/// that event.
pub struct TeePipe<'a> {
    first: Box<dyn XmlConsumer + 'a>,
    second: Box<dyn XmlConsumer + 'a>,
}

impl<'a> TeePipe<'a> {
    pub fn new(first: Box<dyn XmlConsumer + 'a>, second: Box<dyn XmlConsumer + 'a>) -> Self {
        TeePipe { first, second }
    }

    /// Split back into the two consumers
    pub fn into_inner(self) -> (Box<dyn XmlConsumer + 'a>, Box<dyn XmlConsumer + 'a>) {
        (self.first, self.second)
    }

    fn both<F>(&mut self, mut f: F) -> XmlResult
    where
        F: FnMut(&mut dyn XmlConsumer) -> XmlResult,
    {
        f(self.first.as_mut())?;
        f(self.second.as_mut())
    }

    fn both_lexical<F>(&mut self, mut f: F) -> XmlResult
    where
        F: FnMut(&mut dyn LexicalHandler) -> XmlResult,
    {
        if let Some(handler) = self.first.lexical_handler() {
            f(handler)?;
        }
        if let Some(handler) = self.second.lexical_handler() {
            f(handler)?;
        }
        Ok(())
    }
}

impl ContentHandler for TeePipe<'_> {
    fn position(&mut self, position: TextPosition) {
        self.first.position(position);
        self.second.position(position);
    }

    fn start_document(&mut self) -> XmlResult {
        self.both(|c| c.start_document())
    }

    fn end_document(&mut self) -> XmlResult {
        self.both(|c| c.end_document())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
        self.both(|c| c.start_prefix_mapping(prefix, uri))
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> XmlResult {
        self.both(|c| c.end_prefix_mapping(prefix))
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> XmlResult {
        self.both(|c| c.start_element(uri, local_name, qname, attributes))
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> XmlResult {
        self.both(|c| c.end_element(uri, local_name, qname))
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        self.both(|c| c.characters(text))
    }

    fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
        self.both(|c| c.ignorable_whitespace(text))
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
        self.both(|c| c.processing_instruction(target, data))
    }

    fn skipped_entity(&mut self, name: &str) -> XmlResult {
        self.both(|c| c.skipped_entity(name))
    }
}

impl LexicalHandler for TeePipe<'_> {
    fn start_dtd(&mut self, name: &str, public_id: &str, system_id: &str) -> XmlResult {
        self.both_lexical(|h| h.start_dtd(name, public_id, system_id))
    }

    fn end_dtd(&mut self) -> XmlResult {
        self.both_lexical(|h| h.end_dtd())
    }

    fn start_entity(&mut self, name: &str) -> XmlResult {
        self.both_lexical(|h| h.start_entity(name))
    }

    fn end_entity(&mut self, name: &str) -> XmlResult {
        self.both_lexical(|h| h.end_entity(name))
    }

    fn start_cdata(&mut self) -> XmlResult {
        self.both_lexical(|h| h.start_cdata())
    }

    fn end_cdata(&mut self) -> XmlResult {
        self.both_lexical(|h| h.end_cdata())
    }

    fn comment(&mut self, text: &str) -> XmlResult {
        self.both_lexical(|h| h.comment(text))
    }
}

impl XmlConsumer for TeePipe<'_> {
    fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
        Some(self)
    }
}

/// Forwards everything except StartDocument/EndDocument.
///
/// Used to splice a nested fragment into an enclosing stream.
pub struct EmbeddedPipe<'c> {
    inner: &'c mut dyn XmlConsumer,
}

impl<'c> EmbeddedPipe<'c> {
    pub fn new(inner: &'c mut dyn XmlConsumer) -> Self {
        EmbeddedPipe { inner }
    }
}

impl ContentHandler for EmbeddedPipe<'_> {
    fn position(&mut self, position: TextPosition) {
        self.inner.position(position);
    }

    fn start_document(&mut self) -> XmlResult {
        Ok(())
    }

    fn end_document(&mut self) -> XmlResult {
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
        self.inner.start_prefix_mapping(prefix, uri)
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> XmlResult {
        self.inner.end_prefix_mapping(prefix)
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> XmlResult {
        self.inner.start_element(uri, local_name, qname, attributes)
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> XmlResult {
        self.inner.end_element(uri, local_name, qname)
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        self.inner.characters(text)
    }

    fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
        self.inner.ignorable_whitespace(text)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
        self.inner.processing_instruction(target, data)
    }

    fn skipped_entity(&mut self, name: &str) -> XmlResult {
        self.inner.skipped_entity(name)
    }
}

impl XmlConsumer for EmbeddedPipe<'_> {
    fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
        self.inner.lexical_handler()
    }
}
