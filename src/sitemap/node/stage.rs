//! Pipeline Stage Nodes
//!
//! Each stage adds its component to the pipeline; serialize and read then run it.

use super::{ParameterMap, ProcessingNode};
use crate::components::{Generator, Reader, SerializerFactory, StageSetup, TransformerFactory};
use crate::config::{ConfigSource, Location};
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::Environment;
use crate::sitemap::variables::VariableResolver;
use std::sync::Arc;

pub enum StageComponent {
    Generator(Arc<dyn Generator>),
    Transformer(Arc<dyn TransformerFactory>),
    Serializer(Arc<dyn SerializerFactory>),
    Reader(Arc<dyn Reader>),
}

/// `<generate>`, `<transform>`, `<serialize>` and `<read>`.
///
/// Generate and transform add their stage and decline, so the walk goes on
/// to the next sibling. Serialize and read complete the pipeline and run it.
pub struct StageNode {
    component: StageComponent,
    type_name: String,
    src: Option<VariableResolver>,
    /// Sitemap location that `src` is resolved against
    base: Arc<dyn ConfigSource>,
    parameters: ParameterMap,
    mime_type: Option<String>,
    status_code: Option<u16>,
    location: Location,
}

impl StageNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        component: StageComponent,
        type_name: String,
        src: Option<VariableResolver>,
        base: Arc<dyn ConfigSource>,
        parameters: ParameterMap,
        mime_type: Option<String>,
        status_code: Option<u16>,
        location: Location,
    ) -> Self {
        StageNode {
            component,
            type_name,
            src,
            base,
            parameters,
            mime_type,
            status_code,
            location,
        }
    }

    fn setup(&self, env: &dyn Environment, ctx: &InvocationContext) -> Result<StageSetup, ProcessingError> {
        let src = match &self.src {
            Some(src) => Some(src.resolve(ctx, env)?),
            None => None,
        };
        Ok(StageSetup {
            type_name: self.type_name.clone(),
            source: src.as_deref().map(|s| self.base.resolve(s)),
            src,
            parameters: self.parameters.resolve(ctx, env)?,
            mime_type: self.mime_type.clone(),
            status_code: self.status_code,
        })
    }

    fn execute(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        if ctx.is_build_only() {
            return Ok(true);
        }
        ctx.processing_pipeline()?.process(env)
    }
}

impl ProcessingNode for StageNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        let setup = self.setup(env, ctx)?;
        let pipeline = ctx.processing_pipeline()?;
        match &self.component {
            StageComponent::Generator(generator) => {
                pipeline.set_generator(Arc::clone(generator), setup)?;
                Ok(false)
            }
            StageComponent::Transformer(factory) => {
                pipeline.add_transformer(Arc::clone(factory), setup)?;
                Ok(false)
            }
            StageComponent::Serializer(factory) => {
                pipeline.set_serializer(Arc::clone(factory), setup)?;
                self.execute(env, ctx)
            }
            StageComponent::Reader(reader) => {
                pipeline.set_reader(Arc::clone(reader), setup)?;
                self.execute(env, ctx)
            }
        }
    }

    fn location(&self) -> &Location {
        &self.location
    }
}
