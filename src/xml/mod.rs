//! Markup Event Layer
//!
//! - `reader`: bytes to events
//! - `buffer`: record and replay events
//! - `pipe`: compose consumers into chains
//! - `serializer`: events to bytes

pub mod attributes;
pub mod buffer;
pub mod consumer;
pub mod entities;
pub mod event;
pub mod namespace;
pub mod pipe;
pub mod reader;
pub mod scanner;
pub mod serializer;

pub use attributes::{Attribute, Attributes};
pub use buffer::SaxBuffer;
pub use consumer::{ContentHandler, LexicalHandler, TextPosition, XmlConsumer, XmlResult};
pub use event::{SaxEvent, Xmlizable};
pub use pipe::{EmbeddedPipe, TeePipe, XmlPipe};
pub use reader::{parse, parse_str, XmlReader};
pub use serializer::{TextSerializer, XmlSerializer};
