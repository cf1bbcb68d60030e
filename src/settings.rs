//! Processor Settings
//!
//! Tunables for a tree processor and its children, deserializable from JSON.
//! Missing fields take their defaults.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProcessorSettings {
    /// Recompile the tree when its source changes
    pub check_reload: bool,
    /// Internal redirect hops allowed per request
    pub max_redirects: usize,
    /// Mounted child processors kept per mount point
    pub mount_cache_size: usize,
    /// Pipeline type used when a `<pipeline>` names none
    pub default_pipeline: String,
    /// Generator results kept by caching pipelines
    pub pipeline_cache_size: usize,
    /// Compiled match patterns kept per matcher type
    pub pattern_cache_size: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        ProcessorSettings {
            check_reload: true,
            max_redirects: 16,
            mount_cache_size: 32,
            default_pipeline: "noncaching".to_string(),
            pipeline_cache_size: 64,
            pattern_cache_size: 128,
        }
    }
}

impl ProcessorSettings {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
