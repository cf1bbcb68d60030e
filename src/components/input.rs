//! Input Modules
//!
//! Named value sources for `{module:key}` expressions.

use crate::sitemap::environment::Environment;

pub trait InputModule: Send + Sync {
    fn attribute(&self, name: &str, env: &dyn Environment) -> Option<String>;
}

/// `{request-param:name}`
pub struct RequestParameterModule;

impl InputModule for RequestParameterModule {
    fn attribute(&self, name: &str, env: &dyn Environment) -> Option<String> {
        env.request_parameter(name).map(str::to_string)
    }
}

/// `{attribute:name}`, reading the environment's attribute store
pub struct AttributeModule;

impl InputModule for AttributeModule {
    fn attribute(&self, name: &str, env: &dyn Environment) -> Option<String> {
        env.attribute(name).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::environment::RequestEnvironment;

    #[test]
    fn test_modules() {
        let mut env = RequestEnvironment::new("x").with_parameter("q", "rust");
        env.set_attribute("theme", "dark");
        assert_eq!(RequestParameterModule.attribute("q", &env).as_deref(), Some("rust"));
        assert_eq!(AttributeModule.attribute("theme", &env).as_deref(), Some("dark"));
        assert!(AttributeModule.attribute("q", &env).is_none());
    }
}
