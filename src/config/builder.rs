//! Configuration Tree Builder
//!
//! An event consumer that assembles `ConfigElement` trees, stamping each
//! element with the position reported just before its start tag.

use super::element::{ConfigElement, Location};
use crate::xml::attributes::Attributes;
use crate::xml::consumer::{ContentHandler, TextPosition, XmlConsumer, XmlResult};

pub struct ConfigBuilder {
    uri: String,
    position: TextPosition,
    stack: Vec<ConfigElement>,
    root: Option<ConfigElement>,
}

impl ConfigBuilder {
    pub fn new(uri: &str) -> Self {
        ConfigBuilder {
            uri: uri.to_string(),
            position: TextPosition::default(),
            stack: Vec::new(),
            root: None,
        }
    }

    /// The completed root element, if one was closed
    pub fn finish(self) -> Option<ConfigElement> {
        self.root
    }
}

impl ContentHandler for ConfigBuilder {
    fn position(&mut self, position: TextPosition) {
        self.position = position;
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        _qname: &str,
        attributes: &Attributes,
    ) -> XmlResult {
        let location = Location::new(self.uri.as_str(), self.position.line, self.position.column);
        let mut element = ConfigElement::new(local_name, uri, location);
        element.attributes = attributes
            .iter()
            .map(|a| (a.qname.clone(), a.value.clone()))
            .collect();
        self.stack.push(element);
        Ok(())
    }

    fn end_element(&mut self, _uri: &str, _local_name: &str, _qname: &str) -> XmlResult {
        let Some(mut element) = self.stack.pop() else {
            return Ok(());
        };
        let trimmed = element.text.trim();
        if trimmed.len() != element.text.len() {
            element.text = trimmed.to_string();
        }
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> XmlResult {
        if let Some(current) = self.stack.last_mut() {
            current.text.push_str(text);
        }
        Ok(())
    }
}

impl XmlConsumer for ConfigBuilder {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::reader::parse_str;

    #[test]
    fn test_builds_nested_children_in_order() {
        let mut builder = ConfigBuilder::new("mem");
        parse_str("<a><b/><c x='1'><d/></c><!-- skip --></a>", &mut builder).unwrap();
        let root = builder.finish().unwrap();
        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(root.children[1].attribute("x"), Some("1"));
        assert_eq!(root.children[1].children[0].name, "d");
    }

    #[test]
    fn test_location_columns() {
        let mut builder = ConfigBuilder::new("mem");
        parse_str("<a>\n   <b/></a>", &mut builder).unwrap();
        let root = builder.finish().unwrap();
        assert_eq!(root.children[0].location, Location::new("mem", 2, 4));
    }
}
