//! Mount Nodes
//!
//! Delegate a URI prefix to a child processor compiled from another sitemap.

use super::ProcessingNode;
use crate::config::{ConfigSource, Location};
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::Environment;
use crate::sitemap::processor::TreeProcessor;
use crate::sitemap::variables::VariableResolver;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, Weak};

/// File name appended to a mount `src` that names a directory
const DEFAULT_SITEMAP: &str = "sitemap.xmap";

/// `<mount uri-prefix=".." src=".."/>`: hands the rest of the URI to a child
/// processor compiled from another sitemap.
///
/// Child processors are kept per resolved source, so their compiled trees and
/// reload state survive across requests.
pub struct MountNode {
    prefix: VariableResolver,
    src: VariableResolver,
    base: Arc<dyn ConfigSource>,
    check_reload: bool,
    owner: Weak<TreeProcessor>,
    children: Mutex<LruCache<String, Arc<TreeProcessor>>>,
    location: Location,
}

impl MountNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prefix: VariableResolver,
        src: VariableResolver,
        base: Arc<dyn ConfigSource>,
        check_reload: bool,
        owner: Weak<TreeProcessor>,
        cache_size: usize,
        location: Location,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        MountNode {
            prefix,
            src,
            base,
            check_reload,
            owner,
            children: Mutex::new(LruCache::new(capacity)),
            location,
        }
    }

    fn child_processor(&self, src: &str) -> Result<Arc<TreeProcessor>, ProcessingError> {
        let source = self.base.resolve(src);
        let key = source.uri().to_string();

        let mut children = self.children.lock().map_err(|_| ProcessingError::LockPoisoned)?;
        if let Some(child) = children.get(&key) {
            return Ok(Arc::clone(child));
        }

        let owner = self
            .owner
            .upgrade()
            .ok_or_else(|| ProcessingError::ResourceNotFound(format!("processor owning mount at {}", self.location)))?;
        let child = owner.create_child(source, self.check_reload);
        children.put(key, Arc::clone(&child));
        Ok(child)
    }
}

impl ProcessingNode for MountNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        let mut prefix = self.prefix.resolve(ctx, env)?;
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }

        let uri = env.uri().to_string();
        let Some(remaining) = uri.strip_prefix(prefix.as_str()) else {
            return Ok(false);
        };

        let mut src = self.src.resolve(ctx, env)?;
        if src.ends_with('/') {
            src.push_str(DEFAULT_SITEMAP);
        }
        let child = self.child_processor(&src)?;

        let old_prefix = env.uri_prefix().to_string();
        env.set_uri(&format!("{old_prefix}{prefix}"), remaining);
        let result = child.invoke_tree(env, ctx);
        env.set_uri(&old_prefix, &uri);
        result
    }

    fn location(&self) -> &Location {
        &self.location
    }
}
