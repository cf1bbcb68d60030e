//! Redirect Nodes
//!
//! `cocoon:` targets become internal redirects; anything else goes to the client.

use super::ProcessingNode;
use crate::config::Location;
use crate::error::ProcessingError;
use crate::sitemap::context::InvocationContext;
use crate::sitemap::environment::{Environment, REDIRECT_MARKER};
use crate::sitemap::variables::VariableResolver;
use tracing::debug;

/// `<redirect-to uri=".."/>`
///
/// `cocoon://x` restarts processing at the root sitemap with URI `x`.
/// `cocoon:/x` restarts relative to the current sitemap's prefix, unless
/// `global="yes"` makes it root-absolute. Any other URI is an external
/// redirect handed to the environment.
pub struct RedirectNode {
    uri: VariableResolver,
    global: bool,
    location: Location,
}

impl RedirectNode {
    pub fn new(uri: VariableResolver, global: bool, location: Location) -> Self {
        RedirectNode {
            uri,
            global,
            location,
        }
    }
}

impl ProcessingNode for RedirectNode {
    fn invoke(&self, env: &mut dyn Environment, ctx: &mut InvocationContext) -> Result<bool, ProcessingError> {
        let uri = self.uri.resolve(ctx, env)?;

        if let Some(target) = uri.strip_prefix("cocoon://") {
            debug!(target, "internal redirect from root");
            env.set_attribute(REDIRECT_MARKER, target);
        } else if let Some(target) = uri.strip_prefix("cocoon:/") {
            let target = if self.global {
                target.to_string()
            } else {
                format!("{}{}", env.uri_prefix(), target)
            };
            debug!(target = %target, "internal redirect");
            env.set_attribute(REDIRECT_MARKER, &target);
        } else if !ctx.is_build_only() {
            debug!(uri = %uri, "external redirect");
            env.redirect(&uri)?;
        }
        Ok(true)
    }

    fn location(&self) -> &Location {
        &self.location
    }
}
