//! Element Attributes
//!
//! Owned attribute lists carried by start-element events. Events own their
//! data, so attribute lists are copied out of the producer's buffers.

use memchr::memchr;

/// A single attribute with resolved namespace
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attribute {
    /// Namespace URI (empty when the attribute is unqualified)
    pub uri: String,
    /// Local name (after colon)
    pub local_name: String,
    /// Qualified name as written (may include prefix)
    pub qname: String,
    /// Attribute value (entities decoded)
    pub value: String,
}

impl Attribute {
    /// Get the namespace prefix, if any
    pub fn prefix(&self) -> Option<&str> {
        split_name(&self.qname).0
    }
}

/// Ordered attribute list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    items: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes { items: Vec::new() }
    }

    /// Number of attributes
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a fully qualified attribute
    pub fn push(&mut self, uri: &str, local_name: &str, qname: &str, value: &str) {
        self.items.push(Attribute {
            uri: uri.to_string(),
            local_name: local_name.to_string(),
            qname: qname.to_string(),
            value: value.to_string(),
        });
    }

    /// Append an unqualified attribute
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.push("", name, name, value);
        self
    }

    /// Get a value by qualified name
    pub fn get(&self, qname: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|a| a.qname == qname)
            .map(|a| a.value.as_str())
    }

    /// Get a value by namespace URI and local name
    pub fn get_ns(&self, uri: &str, local_name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|a| a.uri == uri && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Split a qualified name into prefix and local name at the colon
pub fn split_name(qname: &str) -> (Option<&str>, &str) {
    if let Some(pos) = memchr(b':', qname.as_bytes()) {
        (Some(&qname[..pos]), &qname[pos + 1..])
    } else {
        (None, qname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_qname_and_namespace() {
        let mut attrs = Attributes::new();
        attrs.push("", "id", "id", "1");
        attrs.push("urn:x", "lang", "x:lang", "en");

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("id"), Some("1"));
        assert_eq!(attrs.get_ns("urn:x", "lang"), Some("en"));
        assert_eq!(attrs.get("lang"), None);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("map:match"), (Some("map"), "match"));
        assert_eq!(split_name("match"), (None, "match"));
    }

    #[test]
    fn test_attribute_prefix() {
        let attrs = Attributes::new().with("xml:space", "preserve");
        let first = attrs.iter().next().unwrap();
        assert_eq!(first.prefix(), Some("xml"));
    }
}
