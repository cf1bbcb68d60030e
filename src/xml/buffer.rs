//! Event Buffer
//!
//! Records markup events as an ordered log and replays them on demand:
//!
//! ```text
//! producer ---> SaxBuffer (record) ... SaxBuffer (replay) ---> consumer
//!                                                      \-----> consumer
//! ```
//!
//! Recording never validates well-formedness; downstream consumers enforce
//! their own rules. Replay is read-only, so a finished buffer may be replayed
//! any number of times, also from several threads at once.

use super::attributes::Attributes;
use super::consumer::{ContentHandler, LexicalHandler, XmlConsumer, XmlResult};
use super::event::{indent, SaxEvent, Xmlizable};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Ordered, replayable recording of markup events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaxBuffer {
    events: Vec<SaxEvent>,
}

impl SaxBuffer {
    pub fn new() -> Self {
        SaxBuffer { events: Vec::new() }
    }

    /// Create with estimated capacity
    pub fn with_capacity(events: usize) -> Self {
        SaxBuffer {
            events: Vec::with_capacity(events),
        }
    }

    /// Append one event
    #[inline]
    pub fn record(&mut self, event: SaxEvent) {
        self.events.push(event);
    }

    /// Append a nested producer; on replay its events are spliced in
    /// without its StartDocument/EndDocument
    pub fn embed(&mut self, fragment: Arc<dyn Xmlizable>) {
        self.events.push(SaxEvent::Embedded(fragment));
    }

    /// Recorded events in order
    pub fn events(&self) -> &[SaxEvent] {
        &self.events
    }

    /// Number of recorded events (an embedded fragment counts as one)
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear the recording, keeping the allocation for reuse
    pub fn recycle(&mut self) {
        self.events.clear();
    }

    /// Replay every event, in recorded order, into the consumer
    pub fn replay(&self, consumer: &mut dyn XmlConsumer) -> XmlResult {
        for event in &self.events {
            event.send(consumer)?;
        }
        Ok(())
    }

    /// Replay into many consumers concurrently.
    ///
    /// Every consumer receives the full sequence; the first error (in
    /// no particular order) is returned.
    pub fn replay_all<C>(&self, consumers: &mut [C]) -> XmlResult
    where
        C: XmlConsumer + Send,
    {
        consumers
            .par_iter_mut()
            .try_for_each(|consumer| self.replay(consumer))
    }

    /// Concatenation of all Characters events
    pub fn text_value(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                SaxEvent::Characters(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Write the line-per-event debug rendering
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        self.dump_at(out, 0)
    }

    /// Debug rendering as a string
    pub fn dump_to_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.dump(&mut out);
        out
    }

    fn dump_at(&self, out: &mut dyn fmt::Write, depth: usize) -> fmt::Result {
        for event in &self.events {
            event.dump(out, depth)?;
        }
        Ok(())
    }
}

/// String coercion yields the text value
impl fmt::Display for SaxBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            if let SaxEvent::Characters(text) = event {
                f.write_str(text)?;
            }
        }
        Ok(())
    }
}

impl Xmlizable for SaxBuffer {
    fn to_sax(&self, consumer: &mut dyn XmlConsumer) -> XmlResult {
        self.replay(consumer)
    }

    fn dump(&self, out: &mut dyn fmt::Write, depth: usize) -> fmt::Result {
        writeln!(out, "{}[XMLizable] Begin nested SaxBuffer", indent(depth))?;
        self.dump_at(out, depth + 1)?;
        writeln!(out, "{}[XMLizable] End nested SaxBuffer", indent(depth))
    }
}

impl ContentHandler for SaxBuffer {
    fn start_document(&mut self) -> XmlResult {
        self.record(SaxEvent::StartDocument);
        Ok(())
    }

    fn end_document(&mut self) -> XmlResult {
        self.record(SaxEvent::EndDocument);
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
        self.record(SaxEvent::StartPrefixMapping {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> XmlResult {
        self.record(SaxEvent::EndPrefixMapping(prefix.to_string()));
        Ok(())
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> XmlResult {
        self.record(SaxEvent::StartElement {
            uri: uri.to_string(),
            local_name: local_name.to_string(),
            qname: qname.to_string(),
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> XmlResult {
        self.record(SaxEvent::EndElement {
            uri: uri.to_string(),
            local_name: local_name.to_string(),
            qname: qname.to_string(),
        });
        Ok(())
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        self.record(SaxEvent::Characters(text.to_string()));
        Ok(())
    }

    fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
        self.record(SaxEvent::IgnorableWhitespace(text.to_string()));
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
        self.record(SaxEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }

    fn skipped_entity(&mut self, name: &str) -> XmlResult {
        self.record(SaxEvent::SkippedEntity(name.to_string()));
        Ok(())
    }
}

impl LexicalHandler for SaxBuffer {
    fn start_dtd(&mut self, name: &str, public_id: &str, system_id: &str) -> XmlResult {
        self.record(SaxEvent::StartDtd {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
        Ok(())
    }

    fn end_dtd(&mut self) -> XmlResult {
        self.record(SaxEvent::EndDtd);
        Ok(())
    }

    fn start_entity(&mut self, name: &str) -> XmlResult {
        self.record(SaxEvent::StartEntity(name.to_string()));
        Ok(())
    }

    fn end_entity(&mut self, name: &str) -> XmlResult {
        self.record(SaxEvent::EndEntity(name.to_string()));
        Ok(())
    }

    fn start_cdata(&mut self) -> XmlResult {
        self.record(SaxEvent::StartCdata);
        Ok(())
    }

    fn end_cdata(&mut self) -> XmlResult {
        self.record(SaxEvent::EndCdata);
        Ok(())
    }

    fn comment(&mut self, text: &str) -> XmlResult {
        self.record(SaxEvent::Comment(text.to_string()));
        Ok(())
    }
}

impl XmlConsumer for SaxBuffer {
    fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::consumer::testing::EventLog;
    use crate::xml::reader::parse_str;
    use proptest::prelude::*;

    fn sample() -> SaxBuffer {
        let mut buffer = SaxBuffer::new();
        buffer.start_document().unwrap();
        buffer
            .start_element("urn:a", "item", "a:item", &Attributes::new().with("id", "1"))
            .unwrap();
        buffer.comment("note").unwrap();
        buffer.characters("Hello, ").unwrap();
        buffer.characters("World!").unwrap();
        buffer.end_element("urn:a", "item", "a:item").unwrap();
        buffer.end_document().unwrap();
        buffer
    }

    #[test]
    fn test_replay_in_recorded_order() {
        let mut log = EventLog::with_lexical();
        sample().replay(&mut log).unwrap();
        assert_eq!(
            log.events,
            vec![
                "start-document",
                "start {urn:a}item a:item [id=1]",
                "comment note",
                "chars Hello, ",
                "chars World!",
                "end {urn:a}item",
                "end-document"
            ]
        );
    }

    #[test]
    fn test_replay_skips_comment_for_content_only_consumer() {
        let mut log = EventLog::content_only();
        sample().replay(&mut log).unwrap();
        assert_eq!(log.events.len(), 6);
        assert!(!log.events.iter().any(|e| e.starts_with("comment")));
        assert_eq!(log.events[2], "chars Hello, ");
    }

    #[test]
    fn test_replay_is_repeatable() {
        let buffer = sample();
        let mut first = EventLog::with_lexical();
        let mut second = EventLog::with_lexical();
        buffer.replay(&mut first).unwrap();
        buffer.replay(&mut second).unwrap();
        assert_eq!(first.events, second.events);
    }

    #[test]
    fn test_recycle_then_record_matches_fresh_buffer() {
        let mut buffer = sample();
        buffer.recycle();
        assert!(buffer.is_empty());

        buffer.characters("again").unwrap();
        let mut fresh = SaxBuffer::new();
        fresh.characters("again").unwrap();
        assert_eq!(buffer, fresh);
    }

    #[test]
    fn test_text_value() {
        let buffer = sample();
        assert_eq!(buffer.text_value(), "Hello, World!");
        assert_eq!(buffer.to_string(), "Hello, World!");
    }

    #[test]
    fn test_recorded_text_is_owned_copy() {
        let mut buffer = SaxBuffer::new();
        let mut scratch = String::from("first");
        buffer.characters(&scratch).unwrap();
        scratch.clear();
        scratch.push_str("second");
        assert_eq!(buffer.text_value(), "first");
    }

    #[test]
    fn test_embedded_fragment_replays_without_document_events() {
        let mut inner = SaxBuffer::new();
        parse_str("<inner>x</inner>", &mut inner).unwrap();

        let mut outer = SaxBuffer::new();
        outer.start_element("", "outer", "outer", &Attributes::new()).unwrap();
        outer.embed(Arc::new(inner));
        outer.end_element("", "outer", "outer").unwrap();

        let mut log = EventLog::content_only();
        outer.replay(&mut log).unwrap();
        assert_eq!(
            log.events,
            vec![
                "start {}outer outer []",
                "start {}inner inner []",
                "chars x",
                "end {}inner",
                "end {}outer"
            ]
        );
    }

    #[test]
    fn test_dump_nested() {
        let mut inner = SaxBuffer::new();
        inner.characters("deep").unwrap();

        let mut outer = SaxBuffer::new();
        outer.start_document().unwrap();
        outer.embed(Arc::new(inner));
        outer.comment("c").unwrap();
        outer.end_document().unwrap();

        assert_eq!(
            outer.dump_to_string(),
            "[StartDocument]\n\
             [XMLizable] Begin nested SaxBuffer\n\
             \x20\x20[Characters] ch=deep\n\
             [XMLizable] End nested SaxBuffer\n\
             [Comment] ch=c\n\
             [EndDocument]\n"
        );
    }

    #[test]
    fn test_replay_all_parallel() {
        let buffer = sample();
        let mut logs: Vec<EventLog> = (0..8).map(|_| EventLog::with_lexical()).collect();
        buffer.replay_all(&mut logs).unwrap();
        assert!(logs.iter().all(|log| log.events.len() == 7));
    }

    fn arb_event() -> impl Strategy<Value = SaxEvent> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(SaxEvent::Characters),
            "[a-z]{1,8}".prop_map(SaxEvent::Comment),
            ("[a-z]{1,4}", "[a-z]{1,6}").prop_map(|(prefix, local)| SaxEvent::StartElement {
                uri: format!("urn:{prefix}"),
                local_name: local.clone(),
                qname: format!("{prefix}:{local}"),
                attributes: Attributes::new().with("k", &local),
            }),
            ("[a-z]{1,6}").prop_map(|local| SaxEvent::EndElement {
                uri: String::new(),
                local_name: local.clone(),
                qname: local,
            }),
            ("[a-z]{1,6}", "[ -~]{0,10}").prop_map(|(target, data)| {
                SaxEvent::ProcessingInstruction { target, data }
            }),
            Just(SaxEvent::StartCdata),
            Just(SaxEvent::EndCdata),
        ]
    }

    proptest! {
        #[test]
        fn prop_replay_reproduces_recorded_sequence(events in prop::collection::vec(arb_event(), 0..40)) {
            let mut source = SaxBuffer::new();
            for event in &events {
                source.record(event.clone());
            }
            let mut copy = SaxBuffer::new();
            source.replay(&mut copy).unwrap();
            prop_assert_eq!(copy.events(), events.as_slice());
        }
    }
}
