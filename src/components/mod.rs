//! Sitemap Components
//!
//! Everything a sitemap refers to by `type` is looked up here:
//!
//! | role        | built in                          | default        |
//! |-------------|-----------------------------------|----------------|
//! | matcher     | wildcard, regexp                  | wildcard       |
//! | selector    | parameter, request-parameter      | parameter      |
//! | action      | (none)                            |                |
//! | generator   | file                              | file           |
//! | transformer | identity, trace                   | identity       |
//! | serializer  | xml, text                         | xml            |
//! | reader      | resource                          | resource       |
//! | input       | request-param, attribute          |                |
//! | pipeline    | noncaching, caching               | from settings  |
//!
//! The registry is immutable once a processor holds it, so it is shared
//! across threads without locking.

pub mod action;
pub mod generator;
pub mod input;
pub mod matcher;
pub mod reader;
pub mod selector;
pub mod serializer;
pub mod transformer;

pub use action::Action;
pub use generator::{CacheValidity, FileGenerator, Generator};
pub use input::{AttributeModule, InputModule, RequestParameterModule};
pub use matcher::{Matcher, RegexpMatcher, WildcardMatcher};
pub use reader::{Reader, ResourceReader};
pub use selector::{ParameterSelector, RequestParameterSelector, Selector};
pub use serializer::{SerializerFactory, TextSerializerFactory, XmlSerializerFactory};
pub use transformer::{
    IdentityTransformerFactory, TraceTransformerFactory, Transformer, TransformerFactory,
};

use crate::config::source::ConfigSource;
use crate::error::ProcessingError;
use crate::settings::ProcessorSettings;
use crate::sitemap::pipeline::{CachingPipelineFactory, NonCachingPipelineFactory, PipelineFactory, ProcessingPipeline};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Resolved name/value pairs: sitemap parameters and scope variables
pub type Parameters = BTreeMap<String, String>;

/// Everything a pipeline stage needs at run time
#[derive(Debug, Clone, Default)]
pub struct StageSetup {
    pub type_name: String,
    /// `src` as written after variable substitution
    pub src: Option<String>,
    /// `src` resolved against the sitemap's own location
    pub source: Option<Arc<dyn ConfigSource>>,
    pub parameters: Parameters,
    pub mime_type: Option<String>,
    pub status_code: Option<u16>,
}

/// Components of one role, by type name
pub struct Role<T: ?Sized> {
    role: &'static str,
    components: HashMap<String, Arc<T>>,
    default: Option<String>,
}

impl<T: ?Sized> Role<T> {
    fn new(role: &'static str) -> Self {
        Role {
            role,
            components: HashMap::new(),
            default: None,
        }
    }

    /// Register a component; the first one registered becomes the default
    pub fn register(&mut self, name: &str, component: Arc<T>) {
        if self.default.is_none() {
            self.default = Some(name.to_string());
        }
        self.components.insert(name.to_string(), component);
    }

    pub fn set_default(&mut self, name: &str) {
        self.default = Some(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Look up by type name, or the default when `name` is `None`
    pub fn get(&self, name: Option<&str>) -> Result<Arc<T>, ProcessingError> {
        let name = match name.or(self.default.as_deref()) {
            Some(name) => name,
            None => return Err(ProcessingError::component_not_found(self.role, "(default)")),
        };
        self.components
            .get(name)
            .cloned()
            .ok_or_else(|| ProcessingError::component_not_found(self.role, name))
    }

    /// Type name `get(name)` would resolve to
    pub fn resolve_name<'a>(&'a self, name: Option<&'a str>) -> Option<&'a str> {
        name.or(self.default.as_deref())
    }
}

pub struct ComponentRegistry {
    pub matchers: Role<dyn Matcher>,
    pub selectors: Role<dyn Selector>,
    pub actions: Role<dyn Action>,
    pub generators: Role<dyn Generator>,
    pub transformers: Role<dyn TransformerFactory>,
    pub serializers: Role<dyn SerializerFactory>,
    pub readers: Role<dyn Reader>,
    pub input_modules: Role<dyn InputModule>,
    pub pipelines: Role<dyn PipelineFactory>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// An empty registry
    pub fn new() -> Self {
        ComponentRegistry {
            matchers: Role::new("matcher"),
            selectors: Role::new("selector"),
            actions: Role::new("action"),
            generators: Role::new("generator"),
            transformers: Role::new("transformer"),
            serializers: Role::new("serializer"),
            readers: Role::new("reader"),
            input_modules: Role::new("input module"),
            pipelines: Role::new("pipeline"),
        }
    }

    /// A registry holding the built-in components
    pub fn with_defaults(settings: &ProcessorSettings) -> Self {
        let mut registry = ComponentRegistry::new();
        let pattern_cache = settings.pattern_cache_size;

        registry
            .matchers
            .register("wildcard", Arc::new(WildcardMatcher::new(pattern_cache)));
        registry
            .matchers
            .register("regexp", Arc::new(RegexpMatcher::new(pattern_cache)));

        registry.selectors.register("parameter", Arc::new(ParameterSelector));
        registry
            .selectors
            .register("request-parameter", Arc::new(RequestParameterSelector));

        registry.generators.register("file", Arc::new(FileGenerator));

        registry
            .transformers
            .register("identity", Arc::new(IdentityTransformerFactory));
        registry
            .transformers
            .register("trace", Arc::new(TraceTransformerFactory));

        registry.serializers.register("xml", Arc::new(XmlSerializerFactory));
        registry.serializers.register("text", Arc::new(TextSerializerFactory));

        registry.readers.register("resource", Arc::new(ResourceReader));

        registry
            .input_modules
            .register("request-param", Arc::new(RequestParameterModule));
        registry
            .input_modules
            .register("attribute", Arc::new(AttributeModule));

        registry
            .pipelines
            .register("noncaching", Arc::new(NonCachingPipelineFactory));
        registry.pipelines.register(
            "caching",
            Arc::new(CachingPipelineFactory::new(settings.pipeline_cache_size)),
        );
        registry.pipelines.set_default(&settings.default_pipeline);

        registry
    }

    /// A fresh pipeline of the given type (default type when `None`)
    pub fn pipeline(&self, name: Option<&str>) -> Result<Box<dyn ProcessingPipeline>, ProcessingError> {
        Ok(self.pipelines.get(name)?.create())
    }
}
