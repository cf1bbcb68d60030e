//! Select Nodes

use super::{invoke_nodes, NodeList, ParameterMap, ProcessingNode};
use crate::components::Selector;
use crate::config::Location;
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::Environment;
use crate::sitemap::variables::VariableResolver;
use std::sync::Arc;

/// One `<when test="..">` branch
pub struct SelectCase {
    pub test: VariableResolver,
    pub children: NodeList,
}

/// `<select>`: runs the first accepted case, else `<otherwise>`
pub struct SelectNode {
    selector: Arc<dyn Selector>,
    parameters: ParameterMap,
    cases: Vec<SelectCase>,
    otherwise: Option<NodeList>,
    location: Location,
}

impl SelectNode {
    pub fn new(
        selector: Arc<dyn Selector>,
        parameters: ParameterMap,
        cases: Vec<SelectCase>,
        otherwise: Option<NodeList>,
        location: Location,
    ) -> Self {
        SelectNode {
            selector,
            parameters,
            cases,
            otherwise,
            location,
        }
    }
}

impl ProcessingNode for SelectNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        let parameters = self.parameters.resolve(ctx, env)?;
        for case in &self.cases {
            let expression = case.test.resolve(ctx, env)?;
            if self.selector.select(&expression, env, &parameters) {
                return invoke_nodes(&case.children, env, ctx);
            }
        }
        match &self.otherwise {
            Some(children) => invoke_nodes(children, env, ctx),
            None => Ok(false),
        }
    }

    fn location(&self) -> &Location {
        &self.location
    }
}
