//! Action Nodes
//!
//! Run an action and expose its result map as a scope for the children.

use super::{invoke_nodes, NodeList, ParameterMap, ProcessingNode};
use crate::components::{Action, Parameters};
use crate::config::Location;
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::Environment;
use crate::sitemap::variables::VariableResolver;
use std::sync::Arc;
use tracing::debug;

/// `<act>`: runs an action; its children see the returned map.
///
/// When only building a pipeline the action is skipped and the children run
/// with an empty scope.
pub struct ActNode {
    action: Arc<dyn Action>,
    source: Option<VariableResolver>,
    label: Option<String>,
    parameters: ParameterMap,
    children: NodeList,
    location: Location,
}

impl ActNode {
    pub fn new(
        action: Arc<dyn Action>,
        source: Option<VariableResolver>,
        label: Option<String>,
        parameters: ParameterMap,
        children: NodeList,
        location: Location,
    ) -> Self {
        ActNode {
            action,
            source,
            label,
            parameters,
            children,
            location,
        }
    }
}

impl ProcessingNode for ActNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        if ctx.is_build_only() {
            debug!(location = %self.location, "build-only: skipping action");
            return ctx.with_scope(self.label.as_deref(), Parameters::new(), |ctx| {
                invoke_nodes(&self.children, env, ctx)
            });
        }

        let source = match &self.source {
            Some(source) => Some(source.resolve(ctx, env)?),
            None => None,
        };
        let parameters = self.parameters.resolve(ctx, env)?;
        match self.action.act(env, source.as_deref(), &parameters)? {
            Some(result) => ctx.with_scope(self.label.as_deref(), result, |ctx| {
                invoke_nodes(&self.children, env, ctx)
            }),
            None => Ok(false),
        }
    }

    fn location(&self) -> &Location {
        &self.location
    }
}
