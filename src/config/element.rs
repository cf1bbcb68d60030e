//! Configuration Element Tree
//!
//! A generic tree of named elements with ordered attributes, children,
//! trimmed text and the source location each element was read from.

use super::builder::ConfigBuilder;
use crate::error::ConfigurationError;
use crate::xml::reader::parse;
use std::fmt;

/// Position in a configuration source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub uri: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new<S: Into<String>>(uri: S, line: u32, column: u32) -> Self {
        Location {
            uri: uri.into(),
            line,
            column,
        }
    }

    /// Placeholder for nodes created outside any source
    pub fn unknown() -> Self {
        Location::new("[unknown location]", 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.uri, self.line, self.column)
    }
}

/// One element of a configuration document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigElement {
    /// Local name
    pub name: String,
    /// Namespace URI, empty when unqualified
    pub namespace: String,
    /// Unqualified attributes in document order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ConfigElement>,
    /// Concatenated character data, trimmed
    pub text: String,
    pub location: Location,
}

impl ConfigElement {
    pub fn new<S: Into<String>>(name: S, namespace: S, location: Location) -> Self {
        ConfigElement {
            name: name.into(),
            namespace: namespace.into(),
            location,
            ..Default::default()
        }
    }

    /// Parse a complete configuration document
    pub fn parse(uri: &str, input: &[u8]) -> Result<ConfigElement, ConfigurationError> {
        let mut builder = ConfigBuilder::new(uri);
        parse(input, &mut builder).map_err(|err| {
            let location = match &err {
                crate::error::XmlError::Malformed { line, column, .. } => {
                    Location::new(uri, *line, *column)
                }
                _ => Location::new(uri, 0, 0),
            };
            ConfigurationError::new(format!("cannot parse configuration: {}", err), &location)
        })?;
        builder.finish().ok_or_else(|| {
            ConfigurationError::new("configuration has no root element", &Location::new(uri, 0, 0))
        })
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: ConfigElement) -> Self {
        self.children.push(child);
        self
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value or a default
    pub fn attribute_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attribute(name).unwrap_or(default)
    }

    pub fn required_attribute(&self, name: &str) -> Result<&str, ConfigurationError> {
        self.attribute(name).ok_or_else(|| {
            ConfigurationError::new(
                format!("<{}> requires attribute '{}'", self.name, name),
                &self.location,
            )
        })
    }

    /// Boolean attribute accepting `yes`/`true`/`no`/`false`
    pub fn bool_attribute(&self, name: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.attribute(name) {
            None => Ok(default),
            Some(value) => match value.trim() {
                "yes" | "true" => Ok(true),
                "no" | "false" => Ok(false),
                other => Err(ConfigurationError::new(
                    format!("attribute '{}' must be yes or no, found '{}'", name, other),
                    &self.location,
                )),
            },
        }
    }

    /// Children with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&ConfigElement> {
        self.children.iter().find(|c| c.name == name)
    }
}
