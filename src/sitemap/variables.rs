//! Sitemap Variable Expressions
//!
//! Attribute values may reference variables:
//!
//! ```text
//! {1}            key "1" of the innermost scope
//! {../1}         key "1" one scope further out
//! {#label:key}   key of the scope pushed under `label`
//! {module:key}   value supplied by an input module
//! \{             a literal brace
//! ```
//!
//! Expressions are compiled with the tree, so unknown modules and
//! unterminated references fail at compile time.

use super::context::InvocationContext;
use super::environment::Environment;
use crate::components::{ComponentRegistry, InputModule};
use crate::config::Location;
use crate::error::{ConfigurationError, ProcessingError};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

enum Part {
    Literal(String),
    Scope { levels_up: usize, key: String },
    Labelled { label: String, key: String },
    Module { module: Arc<dyn InputModule>, key: String },
}

pub struct VariableResolver {
    expression: String,
    parts: Vec<Part>,
}

impl fmt::Debug for VariableResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VariableResolver").field(&self.expression).finish()
    }
}

impl VariableResolver {
    pub fn compile(
        expression: &str,
        registry: &ComponentRegistry,
        location: &Location,
    ) -> Result<Self, ConfigurationError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = expression;

        while let Some(pos) = rest.find(['{', '\\']) {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("\\{") {
                literal.push('{');
                rest = after;
                continue;
            }
            if tail.starts_with('\\') {
                literal.push('\\');
                rest = &tail[1..];
                continue;
            }

            let Some(close) = tail.find('}') else {
                return Err(ConfigurationError::new(
                    format!("unterminated variable reference in '{}'", expression),
                    location,
                ));
            };
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(Self::compile_reference(&tail[1..close], expression, registry, location)?);
            rest = &tail[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(VariableResolver {
            expression: expression.to_string(),
            parts,
        })
    }

    fn compile_reference(
        reference: &str,
        expression: &str,
        registry: &ComponentRegistry,
        location: &Location,
    ) -> Result<Part, ConfigurationError> {
        let invalid = |what: &str| {
            ConfigurationError::new(format!("{} in '{}'", what, expression), location)
        };

        if let Some(labelled) = reference.strip_prefix('#') {
            let (label, key) = labelled
                .split_once(':')
                .ok_or_else(|| invalid("labelled reference needs '#label:key'"))?;
            if label.is_empty() || key.is_empty() {
                return Err(invalid("empty label or key"));
            }
            return Ok(Part::Labelled {
                label: label.to_string(),
                key: key.to_string(),
            });
        }

        if let Some((name, key)) = reference.split_once(':') {
            let module = registry
                .input_modules
                .get(Some(name))
                .map_err(|_| invalid(&format!("unknown input module '{}'", name)))?;
            return Ok(Part::Module {
                module,
                key: key.to_string(),
            });
        }

        let mut key = reference;
        let mut levels_up = 0;
        while let Some(stripped) = key.strip_prefix("../") {
            levels_up += 1;
            key = stripped;
        }
        if key.is_empty() {
            return Err(invalid("empty variable reference"));
        }
        Ok(Part::Scope {
            levels_up,
            key: key.to_string(),
        })
    }

    /// An expression without references
    pub fn literal(text: &str) -> Self {
        VariableResolver {
            expression: text.to_string(),
            parts: vec![Part::Literal(text.to_string())],
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// True when resolving needs no context
    pub fn is_literal(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Literal(_)))
    }

    pub fn resolve(
        &self,
        ctx: &InvocationContext,
        env: &dyn Environment,
    ) -> Result<String, ProcessingError> {
        if let [Part::Literal(text)] = self.parts.as_slice() {
            return Ok(text.clone());
        }

        let mut out = String::with_capacity(self.expression.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Scope { levels_up, key } => {
                    let scope = ctx.scope(*levels_up).ok_or_else(|| {
                        ProcessingError::Variable(format!(
                            "'{}' goes {} level(s) up but only {} scope(s) exist",
                            self.expression,
                            levels_up,
                            ctx.depth()
                        ))
                    })?;
                    match scope.get(key) {
                        Some(value) => out.push_str(value),
                        None => warn!(expression = %self.expression, key = %key, "sitemap variable not found"),
                    }
                }
                Part::Labelled { label, key } => {
                    let scope = ctx.labelled_scope(label).ok_or_else(|| {
                        ProcessingError::Variable(format!(
                            "no scope labelled '{}' for '{}'",
                            label, self.expression
                        ))
                    })?;
                    match scope.get(key) {
                        Some(value) => out.push_str(value),
                        None => warn!(expression = %self.expression, key = %key, "sitemap variable not found"),
                    }
                }
                Part::Module { module, key } => match module.attribute(key, env) {
                    Some(value) => out.push_str(&value),
                    None => warn!(expression = %self.expression, key = %key, "input module has no value"),
                },
            }
        }
        Ok(out)
    }
}
