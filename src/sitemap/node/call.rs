//! Resource Calls

use super::{ParameterMap, ProcessingNode};
use crate::config::Location;
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::Environment;

/// `<call resource="..">`: runs a named resource with the call's
/// parameters as its innermost scope
pub struct CallNode {
    resource: String,
    parameters: ParameterMap,
    location: Location,
}

impl CallNode {
    pub fn new(resource: String, parameters: ParameterMap, location: Location) -> Self {
        CallNode {
            resource,
            parameters,
            location,
        }
    }
}

impl ProcessingNode for CallNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        let node = ctx
            .resource(&self.resource)
            .ok_or_else(|| ProcessingError::ResourceNotFound(format!("sitemap resource '{}'", self.resource)))?;
        let parameters = self.parameters.resolve(ctx, env)?;
        ctx.with_scope(None, parameters, |ctx| node.invoke(env, ctx))
    }

    fn location(&self) -> &Location {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentRegistry;
    use crate::sitemap::context::ResourceMap;
    use crate::sitemap::environment::RequestEnvironment;
    use crate::sitemap::node::testing::CountingNode;
    use crate::sitemap::variables::VariableResolver;
    use std::sync::Arc;

    #[test]
    fn test_call_runs_resource_in_scope() {
        let target = CountingNode::new(true);
        let mut resources = ResourceMap::new();
        resources.insert("page".to_string(), target.clone() as Arc<dyn ProcessingNode>);

        let mut ctx = InvocationContext::new(Arc::new(ComponentRegistry::new()));
        ctx.replace_resources(Arc::new(resources));

        let mut parameters = ParameterMap::new();
        parameters.insert("title", VariableResolver::literal("Home"));
        let call = CallNode::new("page".into(), parameters, Location::unknown());

        let mut env = RequestEnvironment::new("x");
        assert!(call.invoke(&mut env, &mut ctx).unwrap());
        assert_eq!(target.calls(), 1);
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_missing_resource() {
        let mut ctx = InvocationContext::new(Arc::new(ComponentRegistry::new()));
        let call = CallNode::new("nowhere".into(), ParameterMap::new(), Location::unknown());
        let mut env = RequestEnvironment::new("x");
        assert!(matches!(
            call.invoke(&mut env, &mut ctx),
            Err(ProcessingError::ResourceNotFound(_))
        ));
    }
}
