//! Selectors
//!
//! Each `<when test="...">` case of a `<select>` is offered to the selector in
//! declaration order; the first case it accepts wins.

use super::Parameters;
use crate::sitemap::environment::Environment;

pub trait Selector: Send + Sync {
    fn select(&self, expression: &str, env: &dyn Environment, parameters: &Parameters) -> bool;
}

/// Compares the case expression with the `parameter-selector-test` parameter
pub struct ParameterSelector;

impl Selector for ParameterSelector {
    fn select(&self, expression: &str, _env: &dyn Environment, parameters: &Parameters) -> bool {
        parameters
            .get("parameter-selector-test")
            .is_some_and(|value| value == expression)
    }
}

/// Compares the case expression with the request parameter named by `parameter-name`
pub struct RequestParameterSelector;

impl Selector for RequestParameterSelector {
    fn select(&self, expression: &str, env: &dyn Environment, parameters: &Parameters) -> bool {
        let Some(name) = parameters.get("parameter-name") else {
            return false;
        };
        env.request_parameter(name) == Some(expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::environment::RequestEnvironment;

    #[test]
    fn test_parameter_selector() {
        let env = RequestEnvironment::new("x");
        let mut parameters = Parameters::new();
        parameters.insert("parameter-selector-test".into(), "pdf".into());
        assert!(ParameterSelector.select("pdf", &env, &parameters));
        assert!(!ParameterSelector.select("html", &env, &parameters));
        assert!(!ParameterSelector.select("pdf", &env, &Parameters::new()));
    }

    #[test]
    fn test_request_parameter_selector() {
        let env = RequestEnvironment::new("x").with_parameter("format", "text");
        let mut parameters = Parameters::new();
        parameters.insert("parameter-name".into(), "format".into());
        assert!(RequestParameterSelector.select("text", &env, &parameters));
        assert!(!RequestParameterSelector.select("xml", &env, &parameters));
    }
}
