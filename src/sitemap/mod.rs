//! Sitemap Engine
//!
//! - `builder`: compiles a sitemap document into processing nodes
//! - `node`: the node kinds and their `invoke` behaviour
//! - `context`: per-request scope stack and pipeline
//! - `pipeline`: event pipelines assembled by stage nodes
//! - `processor`: compile caching, reload, redirects and mounts
//!
//! ```text
//! Environment -> TreeProcessor::process
//!                  -> root node invoke (fresh InvocationContext)
//!                       -> match/select/act push scopes
//!                       -> stage nodes fill the pipeline
//!                       -> serialize/read run it
//!                  -> follow cocoon: redirects
//! ```

pub mod builder;
pub mod context;
pub mod environment;
pub mod node;
pub mod pipeline;
pub mod processor;
pub mod variables;

pub use builder::{ProcessorTree, TreeBuilder, SITEMAP_NS};
pub use context::{ContextState, InvocationContext, ResourceMap};
pub use environment::{Environment, ForwardEnvironment, RequestEnvironment, REDIRECT_MARKER};
pub use node::{invoke_nodes, NodeList, ParameterMap, ProcessingNode};
pub use pipeline::{
    CachingPipelineFactory, EventPipeline, FragmentCache, NonCachingPipelineFactory, PipelineFactory,
    ProcessingPipeline, StageInfo, StageRole,
};
pub use processor::TreeProcessor;
pub use variables::VariableResolver;
