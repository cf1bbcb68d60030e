//! Invocation Context
//!
//! Per-request state threaded through the node tree:
//! - a stack of variable scopes, optionally labelled for `{#label:key}`
//! - the processing pipeline, looked up on first use
//! - the named resources of the tree currently being walked
//!
//! ```text
//! Idle   <-> Active          push_scope / pop_scope
//! Active  -> PipelineBound   processing_pipeline (idempotent)
//! any     -> Disposed        dispose / reset (idempotent)
//! ```

use super::node::ProcessingNode;
use super::pipeline::ProcessingPipeline;
use crate::components::{ComponentRegistry, Parameters};
use crate::error::ProcessingError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Named resource containers of one compiled tree
pub type ResourceMap = HashMap<String, Arc<dyn ProcessingNode>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Idle,
    Active,
    PipelineBound,
    Disposed,
}

pub struct InvocationContext {
    registry: Arc<ComponentRegistry>,
    scopes: Vec<Parameters>,
    /// Label -> index into `scopes`
    labels: HashMap<String, usize>,
    pipeline_hint: Option<String>,
    pipeline: Option<Box<dyn ProcessingPipeline>>,
    disposed: bool,
    build_only: bool,
    resources: Arc<ResourceMap>,
}

impl InvocationContext {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        InvocationContext {
            registry,
            scopes: Vec::new(),
            labels: HashMap::new(),
            pipeline_hint: None,
            pipeline: None,
            disposed: false,
            build_only: false,
            resources: Arc::new(ResourceMap::new()),
        }
    }

    /// A context that assembles a pipeline without running it
    pub fn build_only(registry: Arc<ComponentRegistry>) -> Self {
        let mut context = InvocationContext::new(registry);
        context.build_only = true;
        context
    }

    pub fn is_build_only(&self) -> bool {
        self.build_only
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn state(&self) -> ContextState {
        if self.pipeline.is_some() {
            ContextState::PipelineBound
        } else if self.disposed {
            ContextState::Disposed
        } else if !self.scopes.is_empty() {
            ContextState::Active
        } else {
            ContextState::Idle
        }
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    /// Push a scope. A label already bound in this context is reported and
    /// left pointing at the earlier scope.
    pub fn push_scope(&mut self, label: Option<&str>, scope: Parameters) {
        let index = self.scopes.len();
        self.scopes.push(scope);
        if let Some(label) = label {
            if self.labels.contains_key(label) {
                error!(label, "scope label already in use; keeping the earlier binding");
            } else {
                self.labels.insert(label.to_string(), index);
            }
        }
    }

    pub fn pop_scope(&mut self) -> Option<Parameters> {
        let scope = self.scopes.pop()?;
        let index = self.scopes.len();
        self.labels.retain(|_, bound| *bound != index);
        Some(scope)
    }

    /// Run `f` with `scope` pushed; the scope is popped on every exit path
    pub fn with_scope<R, F>(&mut self, label: Option<&str>, scope: Parameters, f: F) -> R
    where
        F: FnOnce(&mut InvocationContext) -> R,
    {
        let depth = self.scopes.len();
        self.push_scope(label, scope);
        let result = f(self);
        while self.scopes.len() > depth {
            self.pop_scope();
        }
        result
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Scope `levels_up` levels below the top (0 = innermost)
    pub fn scope(&self, levels_up: usize) -> Option<&Parameters> {
        let index = self.scopes.len().checked_sub(levels_up + 1)?;
        self.scopes.get(index)
    }

    pub fn labelled_scope(&self, label: &str) -> Option<&Parameters> {
        self.labels.get(label).and_then(|&i| self.scopes.get(i))
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    /// Pipeline type to use when the pipeline is first looked up
    pub fn set_pipeline_hint(&mut self, hint: Option<&str>) {
        self.pipeline_hint = hint.map(str::to_string);
    }

    /// The pipeline of this request, created on first call
    pub fn processing_pipeline(&mut self) -> Result<&mut dyn ProcessingPipeline, ProcessingError> {
        let pipeline = match self.pipeline.take() {
            Some(pipeline) => pipeline,
            None => {
                let mut pipeline = self.registry.pipeline(self.pipeline_hint.as_deref())?;
                pipeline.setup(Parameters::new());
                debug!(hint = ?self.pipeline_hint, "processing pipeline created");
                self.disposed = false;
                pipeline
            }
        };
        Ok(self.pipeline.insert(pipeline).as_mut())
    }

    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Hand the pipeline to the caller; it will not be released by `dispose`
    pub fn take_pipeline(&mut self) -> Option<Box<dyn ProcessingPipeline>> {
        self.pipeline.take()
    }

    /// Release the pipeline (once) and forget scope labels
    pub fn dispose(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.release();
        }
        self.labels.clear();
        self.disposed = true;
    }

    /// Clear the scope stack, then dispose, ready for another pass
    pub fn reset(&mut self) {
        self.scopes.clear();
        self.pipeline_hint = None;
        self.dispose();
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub fn resource(&self, name: &str) -> Option<Arc<dyn ProcessingNode>> {
        self.resources.get(name).cloned()
    }

    /// Install the resources of the tree about to be walked, returning the previous ones
    pub fn replace_resources(&mut self, resources: Arc<ResourceMap>) -> Arc<ResourceMap> {
        std::mem::replace(&mut self.resources, resources)
    }
}

impl Drop for InvocationContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{FileGenerator, StageSetup};
    use crate::config::source::MemoryStore;
    use crate::settings::ProcessorSettings;

    fn context() -> InvocationContext {
        InvocationContext::new(Arc::new(ComponentRegistry::with_defaults(
            &ProcessorSettings::default(),
        )))
    }

    fn scope(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_state_transitions() {
        let mut ctx = context();
        assert_eq!(ctx.state(), ContextState::Idle);
        ctx.push_scope(None, Parameters::new());
        assert_eq!(ctx.state(), ContextState::Active);
        ctx.processing_pipeline().unwrap();
        assert_eq!(ctx.state(), ContextState::PipelineBound);
        ctx.dispose();
        assert_eq!(ctx.state(), ContextState::Disposed);
        ctx.dispose();
        assert_eq!(ctx.state(), ContextState::Disposed);
    }

    #[test]
    fn test_pipeline_is_lazy_singleton() {
        let mut ctx = context();
        assert!(!ctx.has_pipeline());
        ctx.processing_pipeline().unwrap().setup(scope(&[("marker", "1")]));
        // Same instance: the stage list survives a second lookup
        let store = MemoryStore::new();
        let setup = StageSetup {
            type_name: "file".into(),
            source: Some(Arc::new(store.source("x.xml"))),
            ..Default::default()
        };
        ctx.processing_pipeline()
            .unwrap()
            .set_generator(Arc::new(FileGenerator), setup)
            .unwrap();
        assert_eq!(ctx.processing_pipeline().unwrap().stages().len(), 1);
    }

    #[test]
    fn test_unknown_pipeline_hint() {
        let mut ctx = context();
        ctx.set_pipeline_hint(Some("quantum"));
        assert!(matches!(
            ctx.processing_pipeline(),
            Err(ProcessingError::ComponentNotFound { role: "pipeline", .. })
        ));
    }

    #[test]
    fn test_scope_lookup() {
        let mut ctx = context();
        ctx.push_scope(Some("outer"), scope(&[("1", "a")]));
        ctx.push_scope(None, scope(&[("1", "b")]));
        assert_eq!(ctx.scope(0).unwrap()["1"], "b");
        assert_eq!(ctx.scope(1).unwrap()["1"], "a");
        assert!(ctx.scope(2).is_none());
        assert_eq!(ctx.labelled_scope("outer").unwrap()["1"], "a");
    }

    #[test]
    fn test_label_collision_keeps_first_binding() {
        let mut ctx = context();
        ctx.push_scope(Some("m"), scope(&[("k", "first")]));
        ctx.push_scope(Some("m"), scope(&[("k", "second")]));
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.labelled_scope("m").unwrap()["k"], "first");
        ctx.pop_scope();
        assert_eq!(ctx.labelled_scope("m").unwrap()["k"], "first");
        ctx.pop_scope();
        assert!(ctx.labelled_scope("m").is_none());
    }

    #[test]
    fn test_with_scope_balances_on_error() {
        let mut ctx = context();
        ctx.push_scope(None, Parameters::new());
        let result: Result<(), ProcessingError> = ctx.with_scope(Some("x"), Parameters::new(), |ctx| {
            ctx.push_scope(None, Parameters::new());
            Err(ProcessingError::pipeline("boom"))
        });
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 1);
        assert!(ctx.labelled_scope("x").is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ctx = context();
        ctx.push_scope(Some("a"), Parameters::new());
        ctx.processing_pipeline().unwrap();
        ctx.reset();
        assert_eq!(ctx.depth(), 0);
        assert!(!ctx.has_pipeline());
        assert_eq!(ctx.state(), ContextState::Disposed);
        // Usable again after a reset
        ctx.processing_pipeline().unwrap();
        assert_eq!(ctx.state(), ContextState::PipelineBound);
    }

    #[test]
    fn test_take_pipeline_skips_release() {
        let mut ctx = context();
        ctx.processing_pipeline().unwrap();
        let taken = ctx.take_pipeline();
        assert!(taken.is_some());
        ctx.dispose();
        assert!(!ctx.has_pipeline());
    }
}
