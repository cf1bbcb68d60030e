//! Processing Nodes
//!
//! The compiled form of a sitemap. `invoke` returns `Ok(true)` once a node
//! (or a descendant) has produced the response, `Ok(false)` when it declines
//! and its parent should try the next sibling.

mod act;
mod call;
mod container;
mod matcher;
mod mount;
mod redirect;
mod select;
mod stage;

pub use act::ActNode;
pub use call::CallNode;
pub use container::{ContainerNode, PipelineNode};
pub use matcher::MatchNode;
pub use mount::MountNode;
pub use redirect::RedirectNode;
pub use select::{SelectCase, SelectNode};
pub use stage::{StageComponent, StageNode};

use super::context::InvocationContext;
use super::environment::Environment;
use super::variables::VariableResolver;
use crate::components::Parameters;
use crate::config::Location;
use crate::error::ProcessingError;
use std::sync::Arc;

pub trait ProcessingNode: Send + Sync {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError>;

    /// Where this node was declared
    fn location(&self) -> &Location;
}

pub type NodeList = Vec<Arc<dyn ProcessingNode>>;

/// Try nodes in order, stopping at the first that succeeds
pub fn invoke_nodes(
    nodes: &[Arc<dyn ProcessingNode>],
    env: &mut dyn Environment,
    ctx: &mut InvocationContext,
) -> Result<bool, ProcessingError> {
    for node in nodes {
        if node.invoke(env, ctx)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `<parameter name=".." value=".."/>` children of a node
#[derive(Default)]
pub struct ParameterMap {
    entries: Vec<(String, VariableResolver)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        ParameterMap::default()
    }

    pub fn insert(&mut self, name: &str, value: VariableResolver) {
        self.entries.push((name.to_string(), value));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve every value; later declarations of a name win
    pub fn resolve(
        &self,
        ctx: &InvocationContext,
        env: &dyn Environment,
    ) -> Result<Parameters, ProcessingError> {
        let mut resolved = Parameters::new();
        for (name, value) in &self.entries {
            resolved.insert(name.clone(), value.resolve(ctx, env)?);
        }
        Ok(resolved)
    }
}
