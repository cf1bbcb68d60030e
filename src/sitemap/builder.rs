//! Sitemap Compiler
//!
//! Turns a parsed sitemap document into a processing node tree. Every element
//! in the sitemap namespace maps to one node kind through [`ELEMENTS`];
//! elements in other namespaces are skipped.

use super::context::ResourceMap;
use super::node::{
    ActNode, CallNode, ContainerNode, MatchNode, MountNode, NodeList, ParameterMap, PipelineNode,
    ProcessingNode, RedirectNode, SelectCase, SelectNode, StageComponent, StageNode,
};
use super::processor::TreeProcessor;
use super::variables::VariableResolver;
use crate::components::ComponentRegistry;
use crate::config::{ConfigElement, ConfigSource};
use crate::error::{ConfigurationError, ProcessingError};
use crate::settings::ProcessorSettings;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::debug;

pub const SITEMAP_NS: &str = "http://apache.org/cocoon/sitemap/1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Children {
    Required,
    Optional,
    Forbidden,
}

struct ElementRule {
    name: &'static str,
    /// Accepts `<parameter>` children
    params: bool,
    children: Children,
}

const fn rule(name: &'static str, params: bool, children: Children) -> ElementRule {
    ElementRule {
        name,
        params,
        children,
    }
}

const ELEMENTS: &[ElementRule] = &[
    rule("sitemap", false, Children::Required),
    rule("pipelines", false, Children::Required),
    rule("pipeline", false, Children::Required),
    rule("resources", false, Children::Required),
    rule("resource", false, Children::Required),
    rule("match", true, Children::Required),
    rule("select", true, Children::Required),
    rule("when", false, Children::Required),
    rule("otherwise", false, Children::Required),
    rule("act", true, Children::Optional),
    rule("generate", true, Children::Forbidden),
    rule("transform", true, Children::Forbidden),
    rule("serialize", true, Children::Forbidden),
    rule("read", true, Children::Forbidden),
    rule("redirect-to", false, Children::Forbidden),
    rule("call", true, Children::Forbidden),
    rule("mount", false, Children::Forbidden),
];

fn element_rule(element: &ConfigElement) -> Result<&'static ElementRule, ConfigurationError> {
    ELEMENTS
        .iter()
        .find(|r| r.name == element.name)
        .ok_or_else(|| ConfigurationError::new(format!("unknown sitemap element <{}>", element.name), &element.location))
}

fn in_sitemap_ns(element: &ConfigElement) -> bool {
    element.namespace == SITEMAP_NS
}

/// A compiled sitemap
pub struct ProcessorTree {
    pub root: Arc<dyn ProcessingNode>,
    pub resources: Arc<ResourceMap>,
}

pub struct TreeBuilder<'a> {
    registry: &'a ComponentRegistry,
    settings: &'a ProcessorSettings,
    /// Location of the sitemap, for resolving relative `src` attributes
    source: Arc<dyn ConfigSource>,
    owner: Weak<TreeProcessor>,
    resource_names: HashSet<String>,
    resources: ResourceMap,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        registry: &'a ComponentRegistry,
        settings: &'a ProcessorSettings,
        source: Arc<dyn ConfigSource>,
        owner: Weak<TreeProcessor>,
    ) -> Self {
        TreeBuilder {
            registry,
            settings,
            source,
            owner,
            resource_names: HashSet::new(),
            resources: ResourceMap::new(),
        }
    }

    pub fn build(mut self, root: &ConfigElement) -> Result<ProcessorTree, ConfigurationError> {
        if root.name != "sitemap" || !in_sitemap_ns(root) {
            return Err(ConfigurationError::new(
                format!("root element must be <sitemap> in namespace {}", SITEMAP_NS),
                &root.location,
            ));
        }
        self.collect_resource_names(root)?;

        let (_, elements) = self.split_children(root)?;
        let children = self.build_nodes(&elements)?;
        let root_node: Arc<dyn ProcessingNode> = Arc::new(ContainerNode::new(children, root.location.clone()));

        Ok(ProcessorTree {
            root: root_node,
            resources: Arc::new(self.resources),
        })
    }

    /// Names of all resources, so `call` can be checked before the
    /// resources themselves are compiled
    fn collect_resource_names(&mut self, root: &ConfigElement) -> Result<(), ConfigurationError> {
        for resources in root.children_named("resources").filter(|e| in_sitemap_ns(e)) {
            for resource in resources.children_named("resource").filter(|e| in_sitemap_ns(e)) {
                let name = resource.required_attribute("name")?;
                if !self.resource_names.insert(name.to_string()) {
                    return Err(ConfigurationError::new(
                        format!("duplicate resource '{}'", name),
                        &resource.location,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Separate `<parameter>` children from the rest, enforcing the
    /// element's parameter and child rules
    fn split_children<'e>(
        &self,
        element: &'e ConfigElement,
    ) -> Result<(ParameterMap, Vec<&'e ConfigElement>), ConfigurationError> {
        let rule = element_rule(element)?;
        let mut parameters = ParameterMap::new();
        let mut elements = Vec::new();

        for child in &element.children {
            if !in_sitemap_ns(child) {
                debug!(element = %child.name, namespace = %child.namespace, "skipping foreign element");
                continue;
            }
            if child.name == "parameter" {
                if !rule.params {
                    return Err(ConfigurationError::new(
                        format!("<{}> does not accept parameters", element.name),
                        &child.location,
                    ));
                }
                let name = child.required_attribute("name")?;
                let value = self.expression(child, child.required_attribute("value")?)?;
                parameters.insert(name, value);
            } else {
                elements.push(child);
            }
        }

        match rule.children {
            Children::Required if elements.is_empty() => Err(ConfigurationError::new(
                format!("<{}> must have at least one child", element.name),
                &element.location,
            )),
            Children::Forbidden if !elements.is_empty() => Err(ConfigurationError::new(
                format!("<{}> does not accept child elements", element.name),
                &elements[0].location,
            )),
            _ => Ok((parameters, elements)),
        }
    }

    fn build_nodes(&mut self, elements: &[&ConfigElement]) -> Result<NodeList, ConfigurationError> {
        let mut nodes = NodeList::with_capacity(elements.len());
        for element in elements {
            if let Some(node) = self.build_node(element)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Compile one element; `None` for elements that only register things
    fn build_node(&mut self, element: &ConfigElement) -> Result<Option<Arc<dyn ProcessingNode>>, ConfigurationError> {
        let (parameters, elements) = self.split_children(element)?;
        let location = element.location.clone();

        let node: Arc<dyn ProcessingNode> = match element.name.as_str() {
            "pipelines" => Arc::new(ContainerNode::new(self.build_nodes(&elements)?, location)),
            "pipeline" => {
                let pipeline_type = element.attribute("type").map(str::to_string);
                if let Some(name) = &pipeline_type {
                    if !self.registry.pipelines.contains(name) {
                        return Err(ConfigurationError::new(format!("unknown pipeline type '{}'", name), &location));
                    }
                }
                let internal_only = element.bool_attribute("internal-only", false)?;
                Arc::new(PipelineNode::new(
                    pipeline_type,
                    internal_only,
                    self.build_nodes(&elements)?,
                    location,
                ))
            }
            "resources" => {
                self.build_resources(&elements)?;
                return Ok(None);
            }
            "match" => {
                let matcher = self
                    .registry
                    .matchers
                    .get(element.attribute("type"))
                    .map_err(|err| lookup_error(err, element))?;
                let pattern = self.expression(element, element.required_attribute("pattern")?)?;
                if pattern.is_literal() {
                    matcher
                        .check_pattern(pattern.expression())
                        .map_err(|message| ConfigurationError::new(message, &location))?;
                }
                Arc::new(MatchNode::new(
                    matcher,
                    pattern,
                    element.attribute("name").map(str::to_string),
                    parameters,
                    self.build_nodes(&elements)?,
                    location,
                ))
            }
            "select" => self.build_select(element, parameters, &elements)?,
            "act" => {
                let action = self
                    .registry
                    .actions
                    .get(element.attribute("type"))
                    .map_err(|err| lookup_error(err, element))?;
                let source = self.optional_expression(element, "src")?;
                Arc::new(ActNode::new(
                    action,
                    source,
                    element.attribute("name").map(str::to_string),
                    parameters,
                    self.build_nodes(&elements)?,
                    location,
                ))
            }
            "generate" | "transform" | "serialize" | "read" => self.build_stage(element, parameters)?,
            "redirect-to" => {
                let uri = self.expression(element, element.required_attribute("uri")?)?;
                let global = element.bool_attribute("global", false)?;
                Arc::new(RedirectNode::new(uri, global, location))
            }
            "call" => {
                let resource = element.required_attribute("resource")?;
                if !self.resource_names.contains(resource) {
                    return Err(ConfigurationError::new(
                        format!("call to unknown resource '{}'", resource),
                        &location,
                    ));
                }
                Arc::new(CallNode::new(resource.to_string(), parameters, location))
            }
            "mount" => {
                let prefix = self.expression(element, element.required_attribute("uri-prefix")?)?;
                let src = self.expression(element, element.required_attribute("src")?)?;
                let check_reload = element.bool_attribute("check-reload", self.settings.check_reload)?;
                Arc::new(MountNode::new(
                    prefix,
                    src,
                    Arc::clone(&self.source),
                    check_reload,
                    self.owner.clone(),
                    self.settings.mount_cache_size,
                    location,
                ))
            }
            other => {
                return Err(ConfigurationError::new(
                    format!("<{}> is not allowed here", other),
                    &location,
                ))
            }
        };
        Ok(Some(node))
    }

    fn build_resources(&mut self, elements: &[&ConfigElement]) -> Result<(), ConfigurationError> {
        for resource in elements {
            if resource.name != "resource" {
                return Err(ConfigurationError::new(
                    format!("<resources> may only contain <resource>, found <{}>", resource.name),
                    &resource.location,
                ));
            }
            let name = resource.required_attribute("name")?;
            let (_, children) = self.split_children(resource)?;
            let container = ContainerNode::new(self.build_nodes(&children)?, resource.location.clone());
            self.resources.insert(name.to_string(), Arc::new(container));
        }
        Ok(())
    }

    fn build_select(
        &mut self,
        element: &ConfigElement,
        parameters: ParameterMap,
        elements: &[&ConfigElement],
    ) -> Result<Arc<dyn ProcessingNode>, ConfigurationError> {
        let selector = self
            .registry
            .selectors
            .get(element.attribute("type"))
            .map_err(|err| lookup_error(err, element))?;

        let mut cases = Vec::new();
        let mut otherwise = None;
        for case in elements {
            let (_, children) = self.split_children(case)?;
            match case.name.as_str() {
                "when" if otherwise.is_none() => {
                    let test = self.expression(case, case.required_attribute("test")?)?;
                    cases.push(SelectCase {
                        test,
                        children: self.build_nodes(&children)?,
                    });
                }
                "otherwise" if otherwise.is_none() => otherwise = Some(self.build_nodes(&children)?),
                "when" | "otherwise" => {
                    return Err(ConfigurationError::new(
                        "<otherwise> must be the last case of <select>",
                        &case.location,
                    ))
                }
                other => {
                    return Err(ConfigurationError::new(
                        format!("<select> may only contain <when> and <otherwise>, found <{}>", other),
                        &case.location,
                    ))
                }
            }
        }

        Ok(Arc::new(SelectNode::new(
            selector,
            parameters,
            cases,
            otherwise,
            element.location.clone(),
        )))
    }

    fn build_stage(
        &self,
        element: &ConfigElement,
        parameters: ParameterMap,
    ) -> Result<Arc<dyn ProcessingNode>, ConfigurationError> {
        let type_attr = element.attribute("type");
        let registry = self.registry;
        let (component, type_name) = match element.name.as_str() {
            "generate" => (
                StageComponent::Generator(registry.generators.get(type_attr).map_err(|e| lookup_error(e, element))?),
                registry.generators.resolve_name(type_attr),
            ),
            "transform" => (
                StageComponent::Transformer(registry.transformers.get(type_attr).map_err(|e| lookup_error(e, element))?),
                registry.transformers.resolve_name(type_attr),
            ),
            "serialize" => (
                StageComponent::Serializer(registry.serializers.get(type_attr).map_err(|e| lookup_error(e, element))?),
                registry.serializers.resolve_name(type_attr),
            ),
            _ => (
                StageComponent::Reader(registry.readers.get(type_attr).map_err(|e| lookup_error(e, element))?),
                registry.readers.resolve_name(type_attr),
            ),
        };

        let status_code = match element.attribute("status-code") {
            Some(code) => Some(code.trim().parse::<u16>().map_err(|_| {
                ConfigurationError::new(format!("invalid status-code '{}'", code), &element.location)
            })?),
            None => None,
        };

        Ok(Arc::new(StageNode::new(
            component,
            type_name.unwrap_or_default().to_string(),
            self.optional_expression(element, "src")?,
            Arc::clone(&self.source),
            parameters,
            element.attribute("mime-type").map(str::to_string),
            status_code,
            element.location.clone(),
        )))
    }

    fn expression(&self, element: &ConfigElement, value: &str) -> Result<VariableResolver, ConfigurationError> {
        VariableResolver::compile(value, self.registry, &element.location)
    }

    fn optional_expression(
        &self,
        element: &ConfigElement,
        attribute: &str,
    ) -> Result<Option<VariableResolver>, ConfigurationError> {
        element
            .attribute(attribute)
            .map(|value| self.expression(element, value))
            .transpose()
    }
}

fn lookup_error(err: ProcessingError, element: &ConfigElement) -> ConfigurationError {
    ConfigurationError::new(err.to_string(), &element.location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;

    fn compile(body: &str) -> Result<ProcessorTree, ConfigurationError> {
        let text = format!(r#"<map:sitemap xmlns:map="{}">{}</map:sitemap>"#, SITEMAP_NS, body);
        let root = ConfigElement::parse("test.xmap", text.as_bytes())?;
        let settings = ProcessorSettings::default();
        let registry = ComponentRegistry::with_defaults(&settings);
        let store = MemoryStore::new();
        let source: Arc<dyn ConfigSource> = Arc::new(store.source("test.xmap"));
        TreeBuilder::new(&registry, &settings, source, Weak::new()).build(&root)
    }

    fn message(result: Result<ProcessorTree, ConfigurationError>) -> String {
        match result {
            Ok(_) => panic!("expected a configuration error"),
            Err(err) => err.message,
        }
    }

    #[test]
    fn test_minimal_sitemap() {
        let tree = compile(
            r#"<map:pipelines><map:pipeline>
                 <map:match pattern="*.html">
                   <map:generate src="{1}.xml"/>
                   <map:serialize/>
                 </map:match>
               </map:pipeline></map:pipelines>"#,
        )
        .unwrap();
        assert!(tree.resources.is_empty());
    }

    #[test]
    fn test_unknown_element() {
        let err = compile("<map:frobnicate/>").err().unwrap();
        assert!(err.message.contains("unknown sitemap element <frobnicate>"));
        assert_eq!(err.location.uri, "test.xmap");
        assert_eq!(err.location.line, 1);
    }

    #[test]
    fn test_foreign_elements_skipped() {
        let tree = compile(
            r#"<doc:note xmlns:doc="urn:doc">ignored</doc:note>
               <map:pipelines><map:pipeline><map:read src="a.txt"/></map:pipeline></map:pipelines>"#,
        );
        assert!(tree.is_ok());
    }

    #[test]
    fn test_empty_container() {
        let msg = message(compile("<map:pipelines/>"));
        assert_eq!(msg, "<pipelines> must have at least one child");
    }

    #[test]
    fn test_parameter_rules() {
        let ok = compile(
            r#"<map:pipelines><map:pipeline><map:read src="a">
                 <map:parameter name="k" value="v"/>
               </map:read></map:pipeline></map:pipelines>"#,
        );
        assert!(ok.is_ok());

        let msg = message(compile(
            r#"<map:pipelines><map:parameter name="k" value="v"/>
               <map:pipeline><map:read src="a"/></map:pipeline></map:pipelines>"#,
        ));
        assert_eq!(msg, "<pipelines> does not accept parameters");
    }

    #[test]
    fn test_leaf_rejects_children() {
        let msg = message(compile(
            r#"<map:pipelines><map:pipeline>
                 <map:serialize><map:read src="a"/></map:serialize>
               </map:pipeline></map:pipelines>"#,
        ));
        assert_eq!(msg, "<serialize> does not accept child elements");
    }

    #[test]
    fn test_missing_attribute() {
        let msg = message(compile(
            r#"<map:pipelines><map:pipeline><map:match><map:read src="a"/></map:match></map:pipeline></map:pipelines>"#,
        ));
        assert_eq!(msg, "<match> requires attribute 'pattern'");
    }

    #[test]
    fn test_unknown_component_types() {
        let msg = message(compile(
            r#"<map:pipelines><map:pipeline><map:generate type="nope"/></map:pipeline></map:pipelines>"#,
        ));
        assert!(msg.contains("generator"));
        assert!(msg.contains("nope"));

        let msg = message(compile(
            r#"<map:pipelines><map:pipeline type="fancy"><map:read src="a"/></map:pipeline></map:pipelines>"#,
        ));
        assert_eq!(msg, "unknown pipeline type 'fancy'");
    }

    #[test]
    fn test_invalid_regexp_pattern() {
        let result = compile(
            r#"<map:pipelines><map:pipeline>
                 <map:match type="regexp" pattern="(unclosed"><map:read src="a"/></map:match>
               </map:pipeline></map:pipelines>"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_resources_and_calls() {
        let tree = compile(
            r#"<map:resources>
                 <map:resource name="page"><map:read src="page.html"/></map:resource>
               </map:resources>
               <map:pipelines><map:pipeline><map:call resource="page"/></map:pipeline></map:pipelines>"#,
        )
        .unwrap();
        assert!(tree.resources.contains_key("page"));

        let msg = message(compile(
            r#"<map:pipelines><map:pipeline><map:call resource="missing"/></map:pipeline></map:pipelines>"#,
        ));
        assert_eq!(msg, "call to unknown resource 'missing'");
    }

    #[test]
    fn test_select_case_order() {
        let ok = compile(
            r#"<map:pipelines><map:pipeline><map:select type="parameter">
                 <map:parameter name="parameter-selector-test" value="{1}"/>
                 <map:when test="a"><map:read src="a"/></map:when>
                 <map:otherwise><map:read src="b"/></map:otherwise>
               </map:select></map:pipeline></map:pipelines>"#,
        );
        assert!(ok.is_ok());

        let msg = message(compile(
            r#"<map:pipelines><map:pipeline><map:select>
                 <map:otherwise><map:read src="b"/></map:otherwise>
                 <map:when test="a"><map:read src="a"/></map:when>
               </map:select></map:pipeline></map:pipelines>"#,
        ));
        assert_eq!(msg, "<otherwise> must be the last case of <select>");
    }

    #[test]
    fn test_bad_variable_expression() {
        let msg = message(compile(
            r#"<map:pipelines><map:pipeline><map:read src="{nomodule:x}"/></map:pipeline></map:pipelines>"#,
        ));
        assert!(msg.contains("unknown input module 'nomodule'"));
    }

    #[test]
    fn test_wrong_root() {
        let root = ConfigElement::parse("x", b"<sitemap/>").unwrap();
        let settings = ProcessorSettings::default();
        let registry = ComponentRegistry::new();
        let store = MemoryStore::new();
        let source: Arc<dyn ConfigSource> = Arc::new(store.source("x"));
        let result = TreeBuilder::new(&registry, &settings, source, Weak::new()).build(&root);
        assert!(result.is_err());
    }
}
