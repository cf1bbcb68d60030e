//! Configuration Documents
//!
//! Sources, the generic element tree parsed from them, and the builder that
//! turns markup events into that tree.

pub mod builder;
pub mod element;
pub mod source;

pub use builder::ConfigBuilder;
pub use element::{ConfigElement, Location};
pub use source::{ConfigSource, FileSource, MemorySource, MemoryStore};
