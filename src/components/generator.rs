//! Generators
//!
//! The first stage of an event pipeline: produce a document as events.

use super::StageSetup;
use crate::config::source::ConfigSource;
use crate::error::ProcessingError;
use crate::xml::consumer::XmlConsumer;
use crate::xml::reader::parse;
use std::sync::Arc;
use std::time::SystemTime;

/// Identifies cacheable generator output and the state it was produced from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValidity {
    pub key: String,
    pub stamp: Option<SystemTime>,
}

pub trait Generator: Send + Sync {
    fn generate(&self, setup: &StageSetup, consumer: &mut dyn XmlConsumer) -> Result<(), ProcessingError>;

    /// `None` means the output must not be cached
    fn validity(&self, _setup: &StageSetup) -> Option<CacheValidity> {
        None
    }
}

pub(crate) fn required_source<'s>(
    role: &str,
    setup: &'s StageSetup,
) -> Result<&'s Arc<dyn ConfigSource>, ProcessingError> {
    setup.source.as_ref().ok_or_else(|| {
        ProcessingError::pipeline(format!("{} '{}' requires a src attribute", role, setup.type_name))
    })
}

/// Parses an XML document named by `src`
pub struct FileGenerator;

impl Generator for FileGenerator {
    fn generate(&self, setup: &StageSetup, consumer: &mut dyn XmlConsumer) -> Result<(), ProcessingError> {
        let source = required_source("generator", setup)?;
        let bytes = source.load()?;
        parse(&bytes, consumer)?;
        Ok(())
    }

    fn validity(&self, setup: &StageSetup) -> Option<CacheValidity> {
        let source = setup.source.as_ref()?;
        Some(CacheValidity {
            key: format!("file:{}", source.uri()),
            stamp: source.last_modified(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::source::MemoryStore;
    use crate::xml::consumer::testing::EventLog;

    fn setup_for(store: &MemoryStore, path: &str) -> StageSetup {
        StageSetup {
            type_name: "file".into(),
            src: Some(path.into()),
            source: Some(Arc::new(store.source(path))),
            ..Default::default()
        }
    }

    #[test]
    fn test_file_generator_streams_document() {
        let store = MemoryStore::new();
        store.insert("doc.xml", "<doc>hi</doc>");
        let mut log = EventLog::content_only();
        FileGenerator.generate(&setup_for(&store, "doc.xml"), &mut log).unwrap();
        assert_eq!(
            log.events,
            vec!["start-document", "start {}doc doc []", "chars hi", "end {}doc", "end-document"]
        );
    }

    #[test]
    fn test_validity_tracks_source_stamp() {
        let store = MemoryStore::new();
        store.insert("doc.xml", "<doc/>");
        let setup = setup_for(&store, "doc.xml");
        let before = FileGenerator.validity(&setup).unwrap();
        store.touch("doc.xml");
        let after = FileGenerator.validity(&setup).unwrap();
        assert_eq!(before.key, "file:doc.xml");
        assert_ne!(before.stamp, after.stamp);
    }

    #[test]
    fn test_missing_src() {
        let mut log = EventLog::content_only();
        let setup = StageSetup {
            type_name: "file".into(),
            ..Default::default()
        };
        assert!(matches!(
            FileGenerator.generate(&setup, &mut log),
            Err(ProcessingError::Pipeline(_))
        ));
    }
}
