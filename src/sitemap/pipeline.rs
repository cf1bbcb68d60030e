//! Processing Pipelines
//!
//! A pipeline is assembled stage by stage while the tree is walked, then
//! run once:
//!
//! ```text
//! generator -> transformer* -> serializer -> response body
//! reader ----------------------------------> response body
//! ```
//!
//! The caching variant records generator output into a `SaxBuffer` held in
//! a shared LRU and replays it while the generator reports the same validity.

use crate::components::{
    Generator, Parameters, Reader, SerializerFactory, StageSetup, TransformerFactory,
};
use crate::error::ProcessingError;
use crate::sitemap::environment::Environment;
use crate::xml::buffer::SaxBuffer;
use crate::xml::consumer::XmlConsumer;
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::debug;

/// Lifecycle: `setup`, stage setters in order, `process`, `release`
pub trait ProcessingPipeline: Send {
    fn setup(&mut self, parameters: Parameters);

    fn set_generator(&mut self, generator: Arc<dyn Generator>, setup: StageSetup) -> Result<(), ProcessingError>;

    fn add_transformer(
        &mut self,
        factory: Arc<dyn TransformerFactory>,
        setup: StageSetup,
    ) -> Result<(), ProcessingError>;

    fn set_serializer(
        &mut self,
        factory: Arc<dyn SerializerFactory>,
        setup: StageSetup,
    ) -> Result<(), ProcessingError>;

    fn set_reader(&mut self, reader: Arc<dyn Reader>, setup: StageSetup) -> Result<(), ProcessingError>;

    /// The stages assembled so far, in order
    fn stages(&self) -> Vec<StageInfo>;

    /// Run the pipeline, writing the result to the environment
    fn process(&mut self, env: &mut dyn Environment) -> Result<bool, ProcessingError>;

    /// Drop all stages and parameters
    fn release(&mut self);
}

/// Creates pipelines of one type
pub trait PipelineFactory: Send + Sync {
    fn create(&self) -> Box<dyn ProcessingPipeline>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Generator,
    Transformer,
    Serializer,
    Reader,
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageRole::Generator => "generator",
            StageRole::Transformer => "transformer",
            StageRole::Serializer => "serializer",
            StageRole::Reader => "reader",
        })
    }
}

/// Introspection view of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    pub role: StageRole,
    pub type_name: String,
    pub src: Option<String>,
}

impl fmt::Display for StageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.src {
            Some(src) => write!(f, "{}:{}({})", self.role, self.type_name, src),
            None => write!(f, "{}:{}", self.role, self.type_name),
        }
    }
}

fn info(role: StageRole, setup: &StageSetup) -> StageInfo {
    StageInfo {
        role,
        type_name: setup.type_name.clone(),
        src: setup.src.clone(),
    }
}

struct CachedFragment {
    stamp: Option<SystemTime>,
    events: Arc<SaxBuffer>,
}

/// Generator output shared by all caching pipelines of one registry
pub struct FragmentCache {
    entries: Mutex<LruCache<String, CachedFragment>>,
}

impl FragmentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        FragmentCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lookup(&self, key: &str, stamp: Option<SystemTime>) -> Result<Option<Arc<SaxBuffer>>, ProcessingError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ProcessingError::LockPoisoned)?;
        let cached = entries
            .get(key)
            .map(|entry| (entry.stamp == stamp, Arc::clone(&entry.events)));
        match cached {
            Some((true, events)) => Ok(Some(events)),
            Some((false, _)) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn store(&self, key: String, stamp: Option<SystemTime>, events: Arc<SaxBuffer>) -> Result<(), ProcessingError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ProcessingError::LockPoisoned)?;
        entries.put(key, CachedFragment { stamp, events });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generator, transformers and serializer over the event pipe chain
pub struct EventPipeline {
    cache: Option<Arc<FragmentCache>>,
    parameters: Parameters,
    generator: Option<(Arc<dyn Generator>, StageSetup)>,
    transformers: Vec<(Arc<dyn TransformerFactory>, StageSetup)>,
    serializer: Option<(Arc<dyn SerializerFactory>, StageSetup)>,
    reader: Option<(Arc<dyn Reader>, StageSetup)>,
}

impl EventPipeline {
    pub fn new(cache: Option<Arc<FragmentCache>>) -> Self {
        EventPipeline {
            cache,
            parameters: Parameters::new(),
            generator: None,
            transformers: Vec::new(),
            serializer: None,
            reader: None,
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn complete(&self) -> bool {
        self.serializer.is_some() || self.reader.is_some()
    }

    fn ensure_open(&self, role: StageRole) -> Result<(), ProcessingError> {
        if self.complete() {
            return Err(ProcessingError::pipeline(format!(
                "cannot add a {} to a completed pipeline",
                role
            )));
        }
        Ok(())
    }

    /// Feed the generator's events into `consumer`, through the cache if enabled
    fn generate_into(
        &self,
        generator: &dyn Generator,
        setup: &StageSetup,
        consumer: &mut dyn XmlConsumer,
    ) -> Result<(), ProcessingError> {
        let (Some(cache), Some(validity)) = (&self.cache, generator.validity(setup)) else {
            return generator.generate(setup, consumer);
        };

        if let Some(events) = cache.lookup(&validity.key, validity.stamp)? {
            debug!(key = %validity.key, "replaying cached generator output");
            events.replay(consumer)?;
            return Ok(());
        }

        let mut recorded = SaxBuffer::new();
        generator.generate(setup, &mut recorded)?;
        recorded.replay(consumer)?;
        cache.store(validity.key, validity.stamp, Arc::new(recorded))?;
        Ok(())
    }

    fn run_reader(&self, env: &mut dyn Environment) -> Result<bool, ProcessingError> {
        let Some((reader, setup)) = &self.reader else {
            return Ok(false);
        };
        let mut body = Vec::new();
        reader.read(setup, &mut body)?;
        env.set_content_type(&reader.mime_type(setup));
        if let Some(status) = setup.status_code {
            env.set_status(status);
        }
        env.write(&body)?;
        Ok(true)
    }
}

impl ProcessingPipeline for EventPipeline {
    fn setup(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    fn set_generator(&mut self, generator: Arc<dyn Generator>, setup: StageSetup) -> Result<(), ProcessingError> {
        self.ensure_open(StageRole::Generator)?;
        if self.generator.is_some() {
            return Err(ProcessingError::pipeline("pipeline already has a generator"));
        }
        self.generator = Some((generator, setup));
        Ok(())
    }

    fn add_transformer(
        &mut self,
        factory: Arc<dyn TransformerFactory>,
        setup: StageSetup,
    ) -> Result<(), ProcessingError> {
        self.ensure_open(StageRole::Transformer)?;
        if self.generator.is_none() {
            return Err(ProcessingError::pipeline("transformer added before a generator"));
        }
        self.transformers.push((factory, setup));
        Ok(())
    }

    fn set_serializer(
        &mut self,
        factory: Arc<dyn SerializerFactory>,
        setup: StageSetup,
    ) -> Result<(), ProcessingError> {
        self.ensure_open(StageRole::Serializer)?;
        if self.generator.is_none() {
            return Err(ProcessingError::pipeline("serializer added before a generator"));
        }
        self.serializer = Some((factory, setup));
        Ok(())
    }

    fn set_reader(&mut self, reader: Arc<dyn Reader>, setup: StageSetup) -> Result<(), ProcessingError> {
        self.ensure_open(StageRole::Reader)?;
        if self.generator.is_some() {
            return Err(ProcessingError::pipeline("a reader cannot follow a generator"));
        }
        self.reader = Some((reader, setup));
        Ok(())
    }

    fn stages(&self) -> Vec<StageInfo> {
        let mut stages = Vec::with_capacity(self.transformers.len() + 2);
        if let Some((_, setup)) = &self.reader {
            stages.push(info(StageRole::Reader, setup));
        }
        if let Some((_, setup)) = &self.generator {
            stages.push(info(StageRole::Generator, setup));
        }
        for (_, setup) in &self.transformers {
            stages.push(info(StageRole::Transformer, setup));
        }
        if let Some((_, setup)) = &self.serializer {
            stages.push(info(StageRole::Serializer, setup));
        }
        stages
    }

    fn process(&mut self, env: &mut dyn Environment) -> Result<bool, ProcessingError> {
        if self.reader.is_some() {
            return self.run_reader(env);
        }
        let (Some((generator, gen_setup)), Some((serializer, ser_setup))) =
            (&self.generator, &self.serializer)
        else {
            return Err(ProcessingError::pipeline(
                "pipeline needs a generator and a serializer, or a reader",
            ));
        };

        let mut body = Vec::new();
        {
            let mut head: Box<dyn XmlConsumer + '_> = serializer.create(&mut body, ser_setup);
            for (factory, setup) in self.transformers.iter().rev() {
                let mut transformer = factory.create(setup)?;
                transformer.set_consumer(head);
                head = transformer;
            }
            self.generate_into(generator.as_ref(), gen_setup, &mut *head)?;
        }

        let mime_type = ser_setup
            .mime_type
            .clone()
            .unwrap_or_else(|| serializer.mime_type().to_string());
        env.set_content_type(&mime_type);
        if let Some(status) = ser_setup.status_code {
            env.set_status(status);
        }
        env.write(&body)?;
        Ok(true)
    }

    fn release(&mut self) {
        self.parameters.clear();
        self.generator = None;
        self.transformers.clear();
        self.serializer = None;
        self.reader = None;
    }
}

pub struct NonCachingPipelineFactory;

impl PipelineFactory for NonCachingPipelineFactory {
    fn create(&self) -> Box<dyn ProcessingPipeline> {
        Box::new(EventPipeline::new(None))
    }
}

pub struct CachingPipelineFactory {
    cache: Arc<FragmentCache>,
}

impl CachingPipelineFactory {
    pub fn new(capacity: usize) -> Self {
        CachingPipelineFactory {
            cache: Arc::new(FragmentCache::new(capacity)),
        }
    }

    pub fn cache(&self) -> &Arc<FragmentCache> {
        &self.cache
    }
}

impl PipelineFactory for CachingPipelineFactory {
    fn create(&self) -> Box<dyn ProcessingPipeline> {
        Box::new(EventPipeline::new(Some(Arc::clone(&self.cache))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        CacheValidity, FileGenerator, IdentityTransformerFactory, ResourceReader,
        TextSerializerFactory, Transformer, XmlSerializerFactory,
    };
    use crate::config::source::MemoryStore;
    use crate::error::XmlError;
    use crate::sitemap::environment::RequestEnvironment;
    use crate::xml::attributes::Attributes;
    use crate::xml::consumer::{ContentHandler, XmlResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn file_setup(store: &MemoryStore, path: &str) -> StageSetup {
        StageSetup {
            type_name: "file".into(),
            src: Some(path.into()),
            source: Some(Arc::new(store.source(path))),
            ..Default::default()
        }
    }

    fn xml_setup() -> StageSetup {
        let mut setup = StageSetup {
            type_name: "xml".into(),
            ..Default::default()
        };
        setup
            .parameters
            .insert("omit-xml-declaration".into(), "yes".into());
        setup
    }

    #[test]
    fn test_generate_transform_serialize() {
        let store = MemoryStore::new();
        store.insert("doc.xml", "<doc><p>hi</p></doc>");
        let mut pipeline = EventPipeline::new(None);
        pipeline
            .set_generator(Arc::new(FileGenerator), file_setup(&store, "doc.xml"))
            .unwrap();
        pipeline
            .add_transformer(Arc::new(IdentityTransformerFactory), StageSetup::default())
            .unwrap();
        pipeline
            .set_serializer(Arc::new(XmlSerializerFactory), xml_setup())
            .unwrap();

        let mut env = RequestEnvironment::new("doc");
        assert!(pipeline.process(&mut env).unwrap());
        assert_eq!(env.body_text(), "<doc><p>hi</p></doc>");
        assert_eq!(env.content_type(), Some("text/xml"));
        assert_eq!(
            pipeline.stages().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            vec!["generator:file(doc.xml)", "transformer:", "serializer:xml"]
        );
    }

    #[test]
    fn test_stage_order_violations() {
        let store = MemoryStore::new();
        let mut pipeline = EventPipeline::new(None);
        assert!(pipeline
            .add_transformer(Arc::new(IdentityTransformerFactory), StageSetup::default())
            .is_err());
        assert!(pipeline
            .set_serializer(Arc::new(TextSerializerFactory), StageSetup::default())
            .is_err());
        pipeline
            .set_generator(Arc::new(FileGenerator), file_setup(&store, "a.xml"))
            .unwrap();
        assert!(pipeline
            .set_generator(Arc::new(FileGenerator), file_setup(&store, "b.xml"))
            .is_err());
        assert!(pipeline
            .set_reader(Arc::new(ResourceReader), StageSetup::default())
            .is_err());
    }

    #[test]
    fn test_incomplete_pipeline_fails() {
        let store = MemoryStore::new();
        store.insert("a.xml", "<a/>");
        let mut pipeline = EventPipeline::new(None);
        pipeline
            .set_generator(Arc::new(FileGenerator), file_setup(&store, "a.xml"))
            .unwrap();
        let mut env = RequestEnvironment::new("a");
        assert!(matches!(
            pipeline.process(&mut env),
            Err(ProcessingError::Pipeline(_))
        ));
    }

    #[test]
    fn test_reader_writes_bytes() {
        let store = MemoryStore::new();
        store.insert("logo.png", vec![0x89u8, b'P', b'N', b'G']);
        let mut pipeline = EventPipeline::new(None);
        let setup = StageSetup {
            type_name: "resource".into(),
            src: Some("logo.png".into()),
            source: Some(Arc::new(store.source("logo.png"))),
            status_code: Some(200),
            ..Default::default()
        };
        pipeline.set_reader(Arc::new(ResourceReader), setup).unwrap();
        let mut env = RequestEnvironment::new("logo.png");
        assert!(pipeline.process(&mut env).unwrap());
        assert_eq!(env.body(), &[0x89, b'P', b'N', b'G']);
        assert_eq!(env.content_type(), Some("image/png"));
        assert_eq!(env.status(), Some(200));
    }

    /// Counts generate calls; validity follows the backing source
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    impl Generator for CountingGenerator {
        fn generate(&self, setup: &StageSetup, consumer: &mut dyn XmlConsumer) -> Result<(), ProcessingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FileGenerator.generate(setup, consumer)
        }

        fn validity(&self, setup: &StageSetup) -> Option<CacheValidity> {
            FileGenerator.validity(setup)
        }
    }

    fn run_cached(factory: &CachingPipelineFactory, generator: &Arc<CountingGenerator>, store: &MemoryStore) -> String {
        let mut pipeline = factory.create();
        pipeline
            .set_generator(generator.clone(), file_setup(store, "doc.xml"))
            .unwrap();
        pipeline
            .set_serializer(Arc::new(TextSerializerFactory), StageSetup::default())
            .unwrap();
        let mut env = RequestEnvironment::new("doc");
        pipeline.process(&mut env).unwrap();
        env.body_text()
    }

    #[test]
    fn test_caching_pipeline_replays_until_source_changes() {
        let store = MemoryStore::new();
        store.insert("doc.xml", "<d>one</d>");
        let factory = CachingPipelineFactory::new(4);
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
        });

        assert_eq!(run_cached(&factory, &generator, &store), "one");
        assert_eq!(run_cached(&factory, &generator, &store), "one");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(factory.cache().len(), 1);

        store.insert("doc.xml", "<d>two</d>");
        assert_eq!(run_cached(&factory, &generator, &store), "two");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    /// A transformer that fails on the first element
    struct Refuse;

    impl ContentHandler for Refuse {
        fn start_element(&mut self, _: &str, local_name: &str, _: &str, _: &Attributes) -> XmlResult {
            Err(XmlError::consumer(format!("no <{}>", local_name)))
        }
        fn end_element(&mut self, _: &str, _: &str, _: &str) -> XmlResult {
            Ok(())
        }
        fn characters(&mut self, _: &str) -> XmlResult {
            Ok(())
        }
    }

    impl XmlConsumer for Refuse {}

    impl<'a> Transformer<'a> for Refuse {
        fn set_consumer(&mut self, _consumer: Box<dyn XmlConsumer + 'a>) {}
    }

    struct RefuseFactory;

    impl TransformerFactory for RefuseFactory {
        fn create<'a>(
            &self,
            _setup: &StageSetup,
        ) -> Result<Box<dyn Transformer<'a> + 'a>, ProcessingError> {
            Ok(Box::new(Refuse))
        }
    }

    #[test]
    fn test_consumer_error_propagates_and_nothing_written() {
        let store = MemoryStore::new();
        store.insert("doc.xml", "<doc/>");
        let mut pipeline = EventPipeline::new(None);
        pipeline
            .set_generator(Arc::new(FileGenerator), file_setup(&store, "doc.xml"))
            .unwrap();
        pipeline
            .add_transformer(Arc::new(RefuseFactory), StageSetup::default())
            .unwrap();
        pipeline
            .set_serializer(Arc::new(XmlSerializerFactory), xml_setup())
            .unwrap();
        let mut env = RequestEnvironment::new("doc");
        assert!(matches!(pipeline.process(&mut env), Err(ProcessingError::Xml(_))));
        assert!(env.body().is_empty());
    }

    #[test]
    fn test_release_clears_stages() {
        let store = MemoryStore::new();
        let mut pipeline = EventPipeline::new(None);
        pipeline
            .set_generator(Arc::new(FileGenerator), file_setup(&store, "a.xml"))
            .unwrap();
        pipeline.release();
        assert!(pipeline.stages().is_empty());
    }
}
