//! Request Environment
//!
//! The host-facing side of request processing. Besides URI and response
//! setters, the environment carries an attribute store; the internal
//! redirect protocol uses it under `REDIRECT_MARKER`.

use crate::error::ProcessingError;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Attribute holding a pending internal redirect target (root-absolute URI)
pub const REDIRECT_MARKER: &str = "sitepipe.internal-redirect";

/// What a request looks like to the processing tree
pub trait Environment {
    /// Request URI, relative to `uri_prefix`
    fn uri(&self) -> &str;

    /// Part of the original URI already consumed by mount points
    fn uri_prefix(&self) -> &str;

    fn set_uri(&mut self, prefix: &str, uri: &str);

    fn request_parameter(&self, name: &str) -> Option<&str>;

    /// Host objects (request, session, ...) by name
    fn object_model(&self, name: &str) -> Option<&Value>;

    fn attribute(&self, name: &str) -> Option<&str>;
    fn set_attribute(&mut self, name: &str, value: &str);
    fn remove_attribute(&mut self, name: &str) -> Option<String>;

    fn set_status(&mut self, status: u16);
    fn set_content_type(&mut self, content_type: &str);

    /// Redirect the client to another location
    fn redirect(&mut self, location: &str) -> Result<(), ProcessingError>;

    /// Append to the response body
    fn write(&mut self, body: &[u8]) -> Result<(), ProcessingError>;

    /// False for requests issued from within processing (internal redirects)
    fn is_external(&self) -> bool {
        true
    }
}

/// A self-contained request/response pair, for hosts and tests
#[derive(Debug, Clone, Default)]
pub struct RequestEnvironment {
    uri: String,
    prefix: String,
    parameters: HashMap<String, String>,
    attributes: HashMap<String, String>,
    object_model: Map<String, Value>,
    status: Option<u16>,
    content_type: Option<String>,
    redirect: Option<String>,
    body: Vec<u8>,
}

impl RequestEnvironment {
    pub fn new(uri: &str) -> Self {
        RequestEnvironment {
            uri: uri.trim_start_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_object(mut self, name: &str, value: Value) -> Self {
        self.object_model.insert(name.to_string(), value);
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Location of an external redirect, if one was issued
    pub fn redirect_location(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Environment for RequestEnvironment {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn uri_prefix(&self) -> &str {
        &self.prefix
    }

    fn set_uri(&mut self, prefix: &str, uri: &str) {
        self.prefix = prefix.to_string();
        self.uri = uri.to_string();
    }

    fn request_parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    fn object_model(&self, name: &str) -> Option<&Value> {
        self.object_model.get(name)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    fn redirect(&mut self, location: &str) -> Result<(), ProcessingError> {
        if self.redirect.is_some() {
            return Err(ProcessingError::pipeline(format!(
                "cannot redirect to '{}': response already redirected",
                location
            )));
        }
        self.redirect = Some(location.to_string());
        Ok(())
    }

    fn write(&mut self, body: &[u8]) -> Result<(), ProcessingError> {
        self.body.extend_from_slice(body);
        Ok(())
    }
}

/// An internal request for another URI, answered through the outer environment
pub struct ForwardEnvironment<'a> {
    outer: &'a mut dyn Environment,
    prefix: String,
    uri: String,
}

impl<'a> ForwardEnvironment<'a> {
    pub fn new(outer: &'a mut dyn Environment, uri: &str) -> Self {
        ForwardEnvironment {
            outer,
            prefix: String::new(),
            uri: uri.trim_start_matches('/').to_string(),
        }
    }
}

impl Environment for ForwardEnvironment<'_> {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn uri_prefix(&self) -> &str {
        &self.prefix
    }

    fn set_uri(&mut self, prefix: &str, uri: &str) {
        self.prefix = prefix.to_string();
        self.uri = uri.to_string();
    }

    fn request_parameter(&self, name: &str) -> Option<&str> {
        self.outer.request_parameter(name)
    }

    fn object_model(&self, name: &str) -> Option<&Value> {
        self.outer.object_model(name)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.outer.attribute(name)
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        self.outer.set_attribute(name, value)
    }

    fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.outer.remove_attribute(name)
    }

    fn set_status(&mut self, status: u16) {
        self.outer.set_status(status)
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.outer.set_content_type(content_type)
    }

    fn redirect(&mut self, location: &str) -> Result<(), ProcessingError> {
        self.outer.redirect(location)
    }

    fn write(&mut self, body: &[u8]) -> Result<(), ProcessingError> {
        self.outer.write(body)
    }

    fn is_external(&self) -> bool {
        false
    }
}
