//! Match Nodes

use super::{invoke_nodes, NodeList, ParameterMap, ProcessingNode};
use crate::components::Matcher;
use crate::config::Location;
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::Environment;
use crate::sitemap::variables::VariableResolver;
use std::sync::Arc;

/// `<match>`: runs its children with the match variables as innermost scope
pub struct MatchNode {
    matcher: Arc<dyn Matcher>,
    pattern: VariableResolver,
    label: Option<String>,
    parameters: ParameterMap,
    children: NodeList,
    location: Location,
}

impl MatchNode {
    pub fn new(
        matcher: Arc<dyn Matcher>,
        pattern: VariableResolver,
        label: Option<String>,
        parameters: ParameterMap,
        children: NodeList,
        location: Location,
    ) -> Self {
        MatchNode {
            matcher,
            pattern,
            label,
            parameters,
            children,
            location,
        }
    }
}

impl ProcessingNode for MatchNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        let pattern = self.pattern.resolve(ctx, env)?;
        let parameters = self.parameters.resolve(ctx, env)?;
        match self.matcher.matches(&pattern, env, &parameters)? {
            Some(variables) => ctx.with_scope(self.label.as_deref(), variables, |ctx| {
                invoke_nodes(&self.children, env, ctx)
            }),
            None => Ok(false),
        }
    }

    fn location(&self) -> &Location {
        &self.location
    }
}
