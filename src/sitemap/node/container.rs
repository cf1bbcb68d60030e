//! Container Nodes
//!
//! Plain child lists and `<pipeline>` sections.

use super::{invoke_nodes, NodeList, ProcessingNode};
use crate::config::Location;
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::Environment;

/// Tries its children in declaration order
pub struct ContainerNode {
    children: NodeList,
    location: Location,
}

impl ContainerNode {
    pub fn new(children: NodeList, location: Location) -> Self {
        ContainerNode { children, location }
    }

    pub fn children(&self) -> &NodeList {
        &self.children
    }
}

impl ProcessingNode for ContainerNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        invoke_nodes(&self.children, env, ctx)
    }

    fn location(&self) -> &Location {
        &self.location
    }
}

/// `<pipeline>`: selects the pipeline type for its children
pub struct PipelineNode {
    pipeline_type: Option<String>,
    internal_only: bool,
    children: NodeList,
    location: Location,
}

impl PipelineNode {
    pub fn new(
        pipeline_type: Option<String>,
        internal_only: bool,
        children: NodeList,
        location: Location,
    ) -> Self {
        PipelineNode {
            pipeline_type,
            internal_only,
            children,
            location,
        }
    }
}

impl ProcessingNode for PipelineNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        if self.internal_only && env.is_external() {
            return Ok(false);
        }
        ctx.set_pipeline_hint(self.pipeline_type.as_deref());
        invoke_nodes(&self.children, env, ctx)
    }

    fn location(&self) -> &Location {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentRegistry;
    use crate::settings::ProcessorSettings;
    use crate::sitemap::environment::{ForwardEnvironment, RequestEnvironment};
    use crate::sitemap::node::testing::{CountingNode, FailingNode};
    use std::sync::Arc;

    fn context() -> InvocationContext {
        InvocationContext::new(Arc::new(ComponentRegistry::with_defaults(
            &ProcessorSettings::default(),
        )))
    }

    #[test]
    fn test_first_success_short_circuits() {
        let first = CountingNode::new(false);
        let second = CountingNode::new(true);
        let third = CountingNode::new(true);
        let children: NodeList = vec![first.clone(), second.clone(), third.clone()];
        let container = ContainerNode::new(children, Location::unknown());

        let mut env = RequestEnvironment::new("x");
        let mut ctx = context();
        assert!(container.invoke(&mut env, &mut ctx).unwrap());
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[test]
    fn test_all_decline() {
        let children: NodeList = vec![CountingNode::new(false), CountingNode::new(false)];
        let container = ContainerNode::new(children, Location::unknown());
        let mut env = RequestEnvironment::new("x");
        assert!(!container.invoke(&mut env, &mut context()).unwrap());
    }

    #[test]
    fn test_error_propagates() {
        let after = CountingNode::new(true);
        let children: NodeList = vec![
            Arc::new(FailingNode {
                location: Location::unknown(),
            }),
            after.clone(),
        ];
        let container = ContainerNode::new(children, Location::unknown());
        let mut env = RequestEnvironment::new("x");
        assert!(container.invoke(&mut env, &mut context()).is_err());
        assert_eq!(after.calls(), 0);
    }

    #[test]
    fn test_internal_only_pipeline() {
        let inner = CountingNode::new(true);
        let children: NodeList = vec![inner.clone()];
        let pipeline = PipelineNode::new(None, true, children, Location::unknown());
        let mut env = RequestEnvironment::new("x");
        let mut ctx = context();

        assert!(!pipeline.invoke(&mut env, &mut ctx).unwrap());
        assert_eq!(inner.calls(), 0);

        let mut forward = ForwardEnvironment::new(&mut env, "y");
        assert!(pipeline.invoke(&mut forward, &mut ctx).unwrap());
        assert_eq!(inner.calls(), 1);
    }
}
