//! Namespace Resolution
//!
//! Stack-based namespace resolver used by the reader to turn prefixes into
//! namespace URIs and to know which mappings end with each element.

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI); the empty prefix is the default namespace
#[derive(Debug, Clone)]
struct NsBinding {
    prefix: String,
    uri: String,
    depth: u16,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    bindings: Vec<NsBinding>,
    depth: u16,
}

impl NamespaceResolver {
    /// Create a new namespace resolver with the `xml` prefix pre-declared
    pub fn new() -> Self {
        NamespaceResolver {
            bindings: vec![NsBinding {
                prefix: "xml".to_string(),
                uri: ns::XML.to_string(),
                depth: 0,
            }],
            depth: 0,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, returning the prefixes declared in it
    pub fn pop_scope(&mut self) -> Vec<String> {
        let mut ended = Vec::new();
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            if let Some(binding) = self.bindings.pop() {
                ended.push(binding.prefix);
            }
        }
        self.depth = self.depth.saturating_sub(1);
        ended
    }

    /// Declare a namespace binding for the current scope.
    /// Returns false for the reserved `xml` and `xmlns` prefixes.
    pub fn declare(&mut self, prefix: &str, uri: &str) -> bool {
        if prefix == "xml" || prefix == "xmlns" {
            return false;
        }
        self.bindings.push(NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
        true
    }

    /// Resolve a prefix to a namespace URI; `""` resolves the default namespace
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    /// Get current depth
    pub fn depth(&self) -> u16 {
        self.depth
    }
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespaces() {
        let resolver = NamespaceResolver::new();
        assert_eq!(resolver.resolve("xml"), Some(ns::XML));
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn test_scope_pop_reports_ended_prefixes() {
        let mut resolver = NamespaceResolver::new();

        resolver.push_scope();
        resolver.declare("foo", "http://example.com/foo");
        resolver.declare("", "http://example.com/default");
        assert_eq!(resolver.resolve("foo"), Some("http://example.com/foo"));

        let ended = resolver.pop_scope();
        assert_eq!(ended, vec!["".to_string(), "foo".to_string()]);
        assert_eq!(resolver.resolve("foo"), None);
    }

    #[test]
    fn test_shadow_binding() {
        let mut resolver = NamespaceResolver::new();

        resolver.push_scope();
        resolver.declare("ns", "urn:one");
        resolver.push_scope();
        resolver.declare("ns", "urn:two");
        assert_eq!(resolver.resolve("ns"), Some("urn:two"));

        resolver.pop_scope();
        assert_eq!(resolver.resolve("ns"), Some("urn:one"));
    }

    #[test]
    fn test_reserved_prefixes_rejected() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        assert!(!resolver.declare("xmlns", "urn:x"));
        assert_eq!(resolver.resolve("xml"), Some(ns::XML));
    }
}
