//! Actions
//!
//! Host-supplied side effects. An action that returns a map lets its
//! children run with that map as their innermost scope; `None` declines.
//! No actions are built in.

use super::Parameters;
use crate::error::ProcessingError;
use crate::sitemap::environment::Environment;

pub trait Action: Send + Sync {
    fn act(
        &self,
        env: &mut dyn Environment,
        source: Option<&str>,
        parameters: &Parameters,
    ) -> Result<Option<Parameters>, ProcessingError>;
}
