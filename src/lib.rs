//! sitepipe - markup event pipelines driven by a sitemap
//!
//! Layers:
//! - `xml`: event model, recording buffer, pipes, reader and serializers
//! - `config`: configuration sources and the generic element tree
//! - `components`: matchers, selectors, actions and pipeline stages by type
//! - `sitemap`: compiles sitemaps into node trees and processes requests
//!
//! ```ignore
//! let store = MemoryStore::new();
//! store.insert("sitemap.xmap", SITEMAP);
//! let processor = TreeProcessor::with_defaults(Arc::new(store.source("sitemap.xmap")));
//! let mut env = RequestEnvironment::new("/index.html");
//! processor.process(&mut env)?;
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod settings;
pub mod sitemap;
pub mod xml;

pub use components::{ComponentRegistry, Parameters, StageSetup};
pub use config::{ConfigElement, ConfigSource, FileSource, Location, MemorySource, MemoryStore};
pub use error::{ConfigurationError, ProcessingError, XmlError};
pub use settings::ProcessorSettings;
pub use sitemap::{Environment, InvocationContext, ProcessingPipeline, RequestEnvironment, TreeProcessor};
pub use xml::{SaxBuffer, SaxEvent, XmlConsumer};
