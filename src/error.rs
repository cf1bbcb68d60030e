//! Error Types
//!
//! Three families of failures:
//! - `XmlError`: raised while producing or consuming markup events
//! - `ConfigurationError`: compile-time failures of a sitemap configuration
//! - `ProcessingError`: everything that aborts request processing
//!
//! A node that declines a request is not an error; it returns `Ok(false)`.

use crate::config::Location;
use thiserror::Error;

/// Failure while producing, parsing or consuming markup events
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("malformed markup at {line}:{column}: {message}")]
    Malformed {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("event consumer failed: {0}")]
    Consumer(String),

    #[error("I/O error while writing markup: {0}")]
    Io(#[from] std::io::Error),
}

impl XmlError {
    pub fn consumer<S: Into<String>>(message: S) -> Self {
        XmlError::Consumer(message.into())
    }
}

/// A configuration that cannot be compiled into a processing tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at {location})")]
pub struct ConfigurationError {
    pub message: String,
    pub location: Location,
}

impl ConfigurationError {
    pub fn new<S: Into<String>>(message: S, location: &Location) -> Self {
        ConfigurationError {
            message: message.into(),
            location: location.clone(),
        }
    }
}

/// Failure while processing a request
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("no {role} component registered under type '{name}'")]
    ComponentNotFound { role: &'static str, name: String },

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("cannot resolve variable: {0}")]
    Variable(String),

    #[error("internal redirect limit of {limit} exceeded")]
    RedirectLoop { limit: usize },

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned")]
    LockPoisoned,
}

impl ProcessingError {
    pub fn pipeline<S: Into<String>>(message: S) -> Self {
        ProcessingError::Pipeline(message.into())
    }

    pub fn component_not_found<S: Into<String>>(role: &'static str, name: S) -> Self {
        ProcessingError::ComponentNotFound {
            role,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let location = Location::new("sitemap.xmap", 3, 7);
        let err = ConfigurationError::new("unknown element 'foo'", &location);
        assert_eq!(err.to_string(), "unknown element 'foo' (at sitemap.xmap:3:7)");
    }

    #[test]
    fn test_processing_error_wraps_configuration() {
        let location = Location::unknown();
        let err: ProcessingError = ConfigurationError::new("bad", &location).into();
        assert!(matches!(err, ProcessingError::Configuration(_)));
    }
}
