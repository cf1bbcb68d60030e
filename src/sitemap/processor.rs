//! Tree Processor
//!
//! Owns one sitemap: compiles it on first use, recompiles it when its source
//! changes, and drives requests through the compiled tree.
//!
//! ## Reload
//!
//! The compiled tree is shared by all requests. Each request takes one
//! snapshot of it at the start of processing and keeps that snapshot until it
//! finishes, even if another thread swaps in a newer tree meanwhile.
//! Staleness is checked without locking; the recompile itself is serialized
//! and re-checks staleness once it holds the lock, so concurrent requests
//! compile a changed sitemap exactly once. A sitemap that fails to recompile
//! leaves the previous tree in service until its source changes again.
//!
//! ## Redirects
//!
//! A `cocoon:` redirect leaves a marker attribute on the environment. After the
//! tree returns, the root processor takes the marker and processes the target
//! URI again through a [`ForwardEnvironment`], up to `max_redirects` hops.

use super::builder::TreeBuilder;
use super::context::{InvocationContext, ResourceMap};
use super::environment::{Environment, ForwardEnvironment, REDIRECT_MARKER};
use super::node::ProcessingNode;
use super::pipeline::ProcessingPipeline;
use crate::components::ComponentRegistry;
use crate::config::{ConfigElement, ConfigSource};
use crate::error::ProcessingError;
use crate::settings::ProcessorSettings;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::SystemTime;
use tracing::{debug, error, info};

struct CompiledTree {
    root: Arc<dyn ProcessingNode>,
    resources: Arc<ResourceMap>,
    /// Source stamp observed when this tree was compiled
    stamp: Option<SystemTime>,
}

pub struct TreeProcessor {
    source: Arc<dyn ConfigSource>,
    registry: Arc<ComponentRegistry>,
    settings: Arc<ProcessorSettings>,
    check_reload: bool,
    parent: Weak<TreeProcessor>,
    tree: RwLock<Option<Arc<CompiledTree>>>,
    compile_lock: Mutex<()>,
    compilations: AtomicUsize,
}

impl fmt::Debug for TreeProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeProcessor")
            .field("source", &self.source.uri())
            .field("check_reload", &self.check_reload)
            .field("compilations", &self.compilation_count())
            .finish()
    }
}

impl TreeProcessor {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        registry: Arc<ComponentRegistry>,
        settings: ProcessorSettings,
    ) -> Arc<Self> {
        let check_reload = settings.check_reload;
        Arc::new(TreeProcessor {
            source,
            registry,
            settings: Arc::new(settings),
            check_reload,
            parent: Weak::new(),
            tree: RwLock::new(None),
            compile_lock: Mutex::new(()),
            compilations: AtomicUsize::new(0),
        })
    }

    /// A root processor with the built-in components
    pub fn with_defaults(source: Arc<dyn ConfigSource>) -> Arc<Self> {
        let settings = ProcessorSettings::default();
        let registry = Arc::new(ComponentRegistry::with_defaults(&settings));
        TreeProcessor::new(source, registry, settings)
    }

    /// A processor for a mounted sitemap. It shares this processor's
    /// components and settings but compiles and reloads on its own.
    pub fn create_child(self: &Arc<Self>, source: Arc<dyn ConfigSource>, check_reload: bool) -> Arc<TreeProcessor> {
        debug!(parent = self.source.uri(), child = source.uri(), "creating child processor");
        Arc::new(TreeProcessor {
            source,
            registry: Arc::clone(&self.registry),
            settings: Arc::clone(&self.settings),
            check_reload,
            parent: Arc::downgrade(self),
            tree: RwLock::new(None),
            compile_lock: Mutex::new(()),
            compilations: AtomicUsize::new(0),
        })
    }

    pub fn source(&self) -> &Arc<dyn ConfigSource> {
        &self.source
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn parent(&self) -> Option<Arc<TreeProcessor>> {
        self.parent.upgrade()
    }

    /// The outermost processor of the mount chain
    pub fn root_processor(self: &Arc<Self>) -> Arc<TreeProcessor> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent.upgrade() {
            current = parent;
        }
        current
    }

    /// How many times the sitemap has been compiled
    pub fn compilation_count(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// Process a request. `Ok(false)` means no pipeline handled it.
    pub fn process(self: &Arc<Self>, env: &mut dyn Environment) -> Result<bool, ProcessingError> {
        let mut ctx = InvocationContext::new(Arc::clone(&self.registry));
        self.run(env, &mut ctx)
    }

    /// Assemble the pipeline `env` would be processed with, without running it
    pub fn build_pipeline(
        self: &Arc<Self>,
        env: &mut dyn Environment,
    ) -> Result<Option<Box<dyn ProcessingPipeline>>, ProcessingError> {
        let mut ctx = InvocationContext::build_only(Arc::clone(&self.registry));
        if self.run(env, &mut ctx)? {
            Ok(ctx.take_pipeline())
        } else {
            Ok(None)
        }
    }

    fn run(self: &Arc<Self>, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        let mut processor = Arc::clone(self);
        let mut target: Option<String> = None;
        let mut hops = 0;

        loop {
            let handled = match &target {
                None => processor.invoke_tree(env, ctx)?,
                Some(uri) => {
                    let mut forward = ForwardEnvironment::new(env, uri);
                    processor.invoke_tree(&mut forward, ctx)?
                }
            };
            if !handled {
                debug!(uri = env.uri(), sitemap = processor.source.uri(), "no pipeline matched");
                return Ok(false);
            }

            let Some(next) = env.remove_attribute(REDIRECT_MARKER) else {
                return Ok(true);
            };
            hops += 1;
            if hops > self.settings.max_redirects {
                return Err(ProcessingError::RedirectLoop {
                    limit: self.settings.max_redirects,
                });
            }
            debug!(target = %next, hop = hops, "following internal redirect");
            ctx.reset();
            processor = self.root_processor();
            target = Some(next);
        }
    }

    /// Walk this processor's tree with the caller's context. The context's
    /// resources are those of this sitemap for the duration of the walk.
    pub(crate) fn invoke_tree(
        self: &Arc<Self>,
        env: &mut dyn Environment,
        ctx: &mut InvocationContext,
    ) -> Result<bool, ProcessingError> {
        let tree = self.current_tree()?;
        let previous = ctx.replace_resources(Arc::clone(&tree.resources));
        let result = tree.root.invoke(env, ctx);
        ctx.replace_resources(previous);
        result
    }

    fn is_current(&self, tree: &CompiledTree) -> bool {
        // any stamp change is stale, including one that moves backwards
        !self.check_reload || self.source.last_modified() == tree.stamp
    }

    fn snapshot(&self) -> Result<Option<Arc<CompiledTree>>, ProcessingError> {
        let tree = self.tree.read().map_err(|_| ProcessingError::LockPoisoned)?;
        Ok(tree.clone())
    }

    fn current_tree(self: &Arc<Self>) -> Result<Arc<CompiledTree>, ProcessingError> {
        if let Some(tree) = self.snapshot()? {
            if self.is_current(&tree) {
                return Ok(tree);
            }
        }

        let _guard = self.compile_lock.lock().map_err(|_| ProcessingError::LockPoisoned)?;
        let existing = self.snapshot()?;
        if let Some(tree) = &existing {
            if self.is_current(tree) {
                return Ok(Arc::clone(tree));
            }
        }

        let stamp = self.source.last_modified();
        let tree = match self.compile(stamp) {
            Ok(tree) => tree,
            Err(err) => match existing {
                // the previous tree carries the broken document's stamp
                Some(old) => {
                    error!(sitemap = self.source.uri(), error = %err, "recompiling sitemap failed; keeping the previous tree");
                    Arc::new(CompiledTree {
                        root: Arc::clone(&old.root),
                        resources: Arc::clone(&old.resources),
                        stamp,
                    })
                }
                None => return Err(err),
            },
        };

        let mut slot = self.tree.write().map_err(|_| ProcessingError::LockPoisoned)?;
        *slot = Some(Arc::clone(&tree));
        Ok(tree)
    }

    fn compile(self: &Arc<Self>, stamp: Option<SystemTime>) -> Result<Arc<CompiledTree>, ProcessingError> {
        let bytes = self.source.load()?;
        let config = ConfigElement::parse(self.source.uri(), &bytes)?;
        let built = TreeBuilder::new(
            &self.registry,
            &self.settings,
            Arc::clone(&self.source),
            Arc::downgrade(self),
        )
        .build(&config)?;

        let count = self.compilations.fetch_add(1, Ordering::SeqCst) + 1;
        info!(sitemap = self.source.uri(), compilation = count, "sitemap compiled");
        Ok(Arc::new(CompiledTree {
            root: built.root,
            resources: built.resources,
            stamp,
        }))
    }
}
