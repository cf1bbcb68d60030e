//! Event Consumer Capabilities
//!
//! Markup events travel over two channels:
//!
//! ```text
//! ContentHandler  - elements, text, prefix mappings, PIs (always present)
//! LexicalHandler  - comments, CDATA markers, DTD and entity boundaries (optional)
//! ```
//!
//! An `XmlConsumer` always handles content events and may expose a lexical
//! channel through `lexical_handler()`. Producers test for that capability
//! before emitting lexical-only events and silently skip them otherwise.

use super::attributes::Attributes;
use crate::error::XmlError;

/// Result of delivering one event
pub type XmlResult = Result<(), XmlError>;

/// Source position of the event that follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

/// Receiver of content events
pub trait ContentHandler {
    /// Reports where the next event starts in its source. Most consumers ignore it.
    fn position(&mut self, _position: TextPosition) {}

    fn start_document(&mut self) -> XmlResult {
        Ok(())
    }

    fn end_document(&mut self) -> XmlResult {
        Ok(())
    }

    fn start_prefix_mapping(&mut self, _prefix: &str, _uri: &str) -> XmlResult {
        Ok(())
    }

    fn end_prefix_mapping(&mut self, _prefix: &str) -> XmlResult {
        Ok(())
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> XmlResult;

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> XmlResult;

    fn characters(&mut self, text: &str) -> XmlResult;

    fn ignorable_whitespace(&mut self, _text: &str) -> XmlResult {
        Ok(())
    }

    fn processing_instruction(&mut self, _target: &str, _data: &str) -> XmlResult {
        Ok(())
    }

    fn skipped_entity(&mut self, _name: &str) -> XmlResult {
        Ok(())
    }
}

/// Receiver of lexical-only events
pub trait LexicalHandler {
    fn start_dtd(&mut self, name: &str, public_id: &str, system_id: &str) -> XmlResult;
    fn end_dtd(&mut self) -> XmlResult;
    fn start_entity(&mut self, name: &str) -> XmlResult;
    fn end_entity(&mut self, name: &str) -> XmlResult;
    fn start_cdata(&mut self) -> XmlResult;
    fn end_cdata(&mut self) -> XmlResult;
    fn comment(&mut self, text: &str) -> XmlResult;
}

/// A content handler that may also accept lexical events
pub trait XmlConsumer: ContentHandler {
    /// The lexical channel, if this consumer supports one
    fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
        None
    }
}

macro_rules! forward_consumer {
    ($ty:ty) => {
        impl<T: XmlConsumer + ?Sized> ContentHandler for $ty {
            fn position(&mut self, position: TextPosition) {
                (**self).position(position)
            }
            fn start_document(&mut self) -> XmlResult {
                (**self).start_document()
            }
            fn end_document(&mut self) -> XmlResult {
                (**self).end_document()
            }
            fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
                (**self).start_prefix_mapping(prefix, uri)
            }
            fn end_prefix_mapping(&mut self, prefix: &str) -> XmlResult {
                (**self).end_prefix_mapping(prefix)
            }
            fn start_element(
                &mut self,
                uri: &str,
                local_name: &str,
                qname: &str,
                attributes: &Attributes,
            ) -> XmlResult {
                (**self).start_element(uri, local_name, qname, attributes)
            }
            fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> XmlResult {
                (**self).end_element(uri, local_name, qname)
            }
            fn characters(&mut self, text: &str) -> XmlResult {
                (**self).characters(text)
            }
            fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
                (**self).ignorable_whitespace(text)
            }
            fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
                (**self).processing_instruction(target, data)
            }
            fn skipped_entity(&mut self, name: &str) -> XmlResult {
                (**self).skipped_entity(name)
            }
        }

        impl<T: XmlConsumer + ?Sized> XmlConsumer for $ty {
            fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
                (**self).lexical_handler()
            }
        }
    };
}

forward_consumer!(&mut T);
forward_consumer!(Box<T>);

macro_rules! forward_lexical {
    ($ty:ty) => {
        impl<T: LexicalHandler + ?Sized> LexicalHandler for $ty {
            fn start_dtd(&mut self, name: &str, public_id: &str, system_id: &str) -> XmlResult {
                (**self).start_dtd(name, public_id, system_id)
            }
            fn end_dtd(&mut self) -> XmlResult {
                (**self).end_dtd()
            }
            fn start_entity(&mut self, name: &str) -> XmlResult {
                (**self).start_entity(name)
            }
            fn end_entity(&mut self, name: &str) -> XmlResult {
                (**self).end_entity(name)
            }
            fn start_cdata(&mut self) -> XmlResult {
                (**self).start_cdata()
            }
            fn end_cdata(&mut self) -> XmlResult {
                (**self).end_cdata()
            }
            fn comment(&mut self, text: &str) -> XmlResult {
                (**self).comment(text)
            }
        }
    };
}

forward_lexical!(&mut T);
forward_lexical!(Box<T>);

#[cfg(test)]
pub(crate) mod testing {
    //! Recording consumers shared by the unit tests of several modules.

    use super::*;

    /// Logs every event as a short string; optionally accepts lexical events
    #[derive(Default)]
    pub struct EventLog {
        pub events: Vec<String>,
        pub lexical: bool,
    }

    impl EventLog {
        pub fn content_only() -> Self {
            EventLog::default()
        }

        pub fn with_lexical() -> Self {
            EventLog {
                events: Vec::new(),
                lexical: true,
            }
        }
    }

    impl ContentHandler for EventLog {
        fn start_document(&mut self) -> XmlResult {
            self.events.push("start-document".into());
            Ok(())
        }
        fn end_document(&mut self) -> XmlResult {
            self.events.push("end-document".into());
            Ok(())
        }
        fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> XmlResult {
            self.events.push(format!("prefix {}={}", prefix, uri));
            Ok(())
        }
        fn end_prefix_mapping(&mut self, prefix: &str) -> XmlResult {
            self.events.push(format!("end-prefix {}", prefix));
            Ok(())
        }
        fn start_element(
            &mut self,
            uri: &str,
            local_name: &str,
            qname: &str,
            attributes: &Attributes,
        ) -> XmlResult {
            let attrs: Vec<String> = attributes
                .iter()
                .map(|a| format!("{}={}", a.qname, a.value))
                .collect();
            self.events.push(format!(
                "start {{{}}}{} {} [{}]",
                uri,
                local_name,
                qname,
                attrs.join(",")
            ));
            Ok(())
        }
        fn end_element(&mut self, uri: &str, local_name: &str, _qname: &str) -> XmlResult {
            self.events.push(format!("end {{{}}}{}", uri, local_name));
            Ok(())
        }
        fn characters(&mut self, text: &str) -> XmlResult {
            self.events.push(format!("chars {}", text));
            Ok(())
        }
        fn ignorable_whitespace(&mut self, text: &str) -> XmlResult {
            self.events.push(format!("ws {:?}", text));
            Ok(())
        }
        fn processing_instruction(&mut self, target: &str, data: &str) -> XmlResult {
            self.events.push(format!("pi {} {}", target, data));
            Ok(())
        }
        fn skipped_entity(&mut self, name: &str) -> XmlResult {
            self.events.push(format!("skipped {}", name));
            Ok(())
        }
    }

    impl LexicalHandler for EventLog {
        fn start_dtd(&mut self, name: &str, _public_id: &str, _system_id: &str) -> XmlResult {
            self.events.push(format!("dtd {}", name));
            Ok(())
        }
        fn end_dtd(&mut self) -> XmlResult {
            self.events.push("end-dtd".into());
            Ok(())
        }
        fn start_entity(&mut self, name: &str) -> XmlResult {
            self.events.push(format!("entity {}", name));
            Ok(())
        }
        fn end_entity(&mut self, name: &str) -> XmlResult {
            self.events.push(format!("end-entity {}", name));
            Ok(())
        }
        fn start_cdata(&mut self) -> XmlResult {
            self.events.push("cdata".into());
            Ok(())
        }
        fn end_cdata(&mut self) -> XmlResult {
            self.events.push("end-cdata".into());
            Ok(())
        }
        fn comment(&mut self, text: &str) -> XmlResult {
            self.events.push(format!("comment {}", text));
            Ok(())
        }
    }

    impl XmlConsumer for EventLog {
        fn lexical_handler(&mut self) -> Option<&mut dyn LexicalHandler> {
            if self.lexical {
                Some(self)
            } else {
                None
            }
        }
    }

    /// Fails on the n-th start element
    pub struct FailingConsumer {
        pub fail_after: usize,
        pub seen: usize,
    }

    impl ContentHandler for FailingConsumer {
        fn start_element(&mut self, _: &str, local_name: &str, _: &str, _: &Attributes) -> XmlResult {
            self.seen += 1;
            if self.seen > self.fail_after {
                return Err(XmlError::consumer(format!("refusing <{}>", local_name)));
            }
            Ok(())
        }
        fn end_element(&mut self, _: &str, _: &str, _: &str) -> XmlResult {
            Ok(())
        }
        fn characters(&mut self, _: &str) -> XmlResult {
            Ok(())
        }
    }

    impl XmlConsumer for FailingConsumer {}
}
