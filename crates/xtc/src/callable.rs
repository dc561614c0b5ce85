//! Templates, interfaces and the callables they expose.

use crate::alert::{AlertKind, AlertSink};
use crate::ast::{Expression, NodeInfo};
use crate::schema::Schema;
use crate::types::{Pattern, Type};
use indexmap::IndexMap;
use std::sync::Arc;

/// Name of the synthetic parameter holding the instance of an instance call.
pub const INSTANCE_PARAM_NAME: &str = "this";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalParameter {
    pub node: NodeInfo,
    pub primary_name: String,
    pub consumes_content: bool,
    pub ty: Type,
    pub has_default: bool,
    pub pattern: Option<Pattern>,
    /// The callee can build the value from a string attribute.
    pub has_constructor: bool,
}

impl FormalParameter {
    pub fn new(node: NodeInfo, primary_name: impl Into<String>, ty: Type) -> Self {
        Self {
            node,
            primary_name: primary_name.into(),
            consumes_content: false,
            ty,
            has_default: false,
            pattern: None,
            has_constructor: false,
        }
    }

    pub fn consuming_content(mut self) -> Self {
        self.consumes_content = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_constructor(mut self) -> Self {
        self.has_constructor = true;
        self
    }

    /// Attribute names this parameter answers to. A bundle parameter answers
    /// to every attribute of its bundle.
    pub fn names(&self) -> Vec<&str> {
        match &self.ty {
            Type::Bundle(bundle) => bundle.attributes.keys().map(String::as_str).collect(),
            _ => vec![self.primary_name.as_str()],
        }
    }

    pub fn has_name(&self, name: &str) -> bool {
        match &self.ty {
            Type::Bundle(bundle) => bundle.attributes.contains_key(name),
            _ => self.primary_name == name,
        }
    }

    /// Whether the parameter may be omitted by callers.
    pub fn has_default(&self) -> bool {
        self.has_default || self.ty.default_value(&self.node).is_some()
    }

    pub fn regex_matches(&self, value: &str) -> bool {
        self.pattern
            .as_ref()
            .is_none_or(|pattern| pattern.matches(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Static,
    Instance,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CallableData {
    pub name: String,
    pub schema: Schema,
    pub parameters: Vec<FormalParameter>,
    pub kind: CallableKind,
}

/// Something that can be called from a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable(Arc<CallableData>);

impl Callable {
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        parameters: Vec<FormalParameter>,
        kind: CallableKind,
    ) -> Self {
        Callable(Arc::new(CallableData {
            name: name.into(),
            schema,
            parameters,
            kind,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn schema(&self) -> &Schema {
        &self.0.schema
    }

    pub fn parameters(&self) -> &[FormalParameter] {
        &self.0.parameters
    }

    pub fn is_instance(&self) -> bool {
        self.0.kind == CallableKind::Instance
    }

    /// Parameter answering to `name`, including bundle attribute names.
    pub fn parameter(&self, name: &str) -> Option<&FormalParameter> {
        self.0
            .parameters
            .iter()
            .find(|parameter| parameter.has_name(name))
    }

    pub fn parameter_by_primary(&self, name: &str) -> Option<&FormalParameter> {
        self.0
            .parameters
            .iter()
            .find(|parameter| parameter.primary_name == name)
    }

    pub fn content_consuming_parameter(&self) -> Option<&FormalParameter> {
        self.0
            .parameters
            .iter()
            .find(|parameter| parameter.consumes_content)
    }

    /// Reports duplicate parameter names and more than one content
    /// consuming parameter.
    pub fn validate_parameters(&self, alerts: &mut dyn AlertSink) {
        let mut seen: Vec<&str> = Vec::new();
        let mut found_content_consumer = false;
        for parameter in &self.0.parameters {
            for name in parameter.names() {
                if seen.contains(&name) {
                    alerts.alert(
                        &parameter.node.position,
                        AlertKind::DuplicateParameterName {
                            name: name.to_string(),
                        },
                    );
                } else {
                    seen.push(name);
                }
            }
            if parameter.consumes_content {
                if found_content_consumer {
                    alerts.alert(
                        &parameter.node.position,
                        AlertKind::TooManyContentParameters {
                            name: parameter.primary_name.clone(),
                        },
                    );
                } else {
                    found_content_consumer = true;
                }
            }
        }
    }
}

/// A declared template parameter with its optional default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub formal: FormalParameter,
    pub default_value: Option<Expression>,
}

impl Parameter {
    pub fn new(formal: FormalParameter) -> Self {
        Self {
            formal,
            default_value: None,
        }
    }

    pub fn with_default_value(mut self, value: Expression) -> Self {
        self.formal.has_default = true;
        self.default_value = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.formal.primary_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Import {
    Class { node: NodeInfo, name: String },
    Package { node: NodeInfo, name: String },
}

fn simple_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, simple)| simple)
}

fn package_name(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(package, _)| package)
}

fn instance_parameter(node: &NodeInfo, name: &str) -> FormalParameter {
    FormalParameter::new(node.clone(), INSTANCE_PARAM_NAME, Type::Instance(name.to_string()))
}

/// Root of a compilation unit: a named, parameterized body of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub node: NodeInfo,
    pub name: String,
    pub schema: Schema,
    pub parameters: Vec<Parameter>,
    pub imports: Vec<Import>,
    pub content: Expression,
}

impl Template {
    pub fn new(
        node: NodeInfo,
        name: impl Into<String>,
        schema: Schema,
        parameters: Vec<Parameter>,
        content: Expression,
    ) -> Self {
        Self {
            node,
            name: name.into(),
            schema,
            parameters,
            imports: Vec::new(),
            content,
        }
    }

    pub fn with_imports(mut self, imports: Vec<Import>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_content(&self, content: Expression) -> Self {
        if Expression::ptr_eq(&self.content, &content) {
            return self.clone();
        }
        Self {
            content,
            ..self.clone()
        }
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    pub fn package(&self) -> Option<&str> {
        package_name(&self.name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name() == name)
    }

    pub fn callable(&self) -> Callable {
        Callable::new(
            self.name.clone(),
            self.schema.clone(),
            self.parameters
                .iter()
                .map(|parameter| parameter.formal.clone())
                .collect(),
            CallableKind::Static,
        )
    }

    /// Callable view taking the template instance as `this`.
    pub fn instance_callable(&self) -> Callable {
        let mut parameters = vec![instance_parameter(&self.node, &self.name)];
        parameters.extend(self.parameters.iter().map(|parameter| parameter.formal.clone()));
        Callable::new(
            self.name.clone(),
            self.schema.clone(),
            parameters,
            CallableKind::Instance,
        )
    }
}

/// A template signature without a body. Only callable on an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub node: NodeInfo,
    pub name: String,
    pub schema: Schema,
    pub parameters: Vec<Parameter>,
}

impl Interface {
    pub fn callable(&self) -> Callable {
        self.instance_callable()
    }

    pub fn instance_callable(&self) -> Callable {
        let mut parameters = vec![instance_parameter(&self.node, &self.name)];
        parameters.extend(self.parameters.iter().map(|parameter| parameter.formal.clone()));
        Callable::new(
            self.name.clone(),
            self.schema.clone(),
            parameters,
            CallableKind::Instance,
        )
    }

    /// Interface parameters cannot carry defaults or constructors.
    pub fn validate(&self, alerts: &mut dyn AlertSink) {
        self.callable().validate_parameters(alerts);
        for parameter in &self.parameters {
            let formal = &parameter.formal;
            if formal.has_default {
                alerts.alert(
                    &formal.node.position,
                    AlertKind::InterfaceParamHasDefault {
                        name: formal.primary_name.clone(),
                    },
                );
            }
            if formal.has_constructor {
                alerts.alert(
                    &formal.node.position,
                    AlertKind::InterfaceParamHasConstructor {
                        name: formal.primary_name.clone(),
                    },
                );
            }
        }
    }
}

/// Resolves callee names. Implemented by whatever knows the compilation set.
pub trait CallableRegistry {
    fn callable(&self, name: &str) -> Option<Callable>;
    fn instance_callable(&self, name: &str) -> Option<Callable>;
}

#[derive(Debug, Clone, Default)]
pub struct CallableSet {
    callables: IndexMap<String, Callable>,
    instance_callables: IndexMap<String, Callable>,
}

impl CallableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_template(&mut self, template: &Template) {
        self.callables
            .insert(template.name.clone(), template.callable());
        self.instance_callables
            .insert(template.name.clone(), template.instance_callable());
    }

    pub fn insert_interface(&mut self, interface: &Interface) {
        self.callables
            .insert(interface.name.clone(), interface.callable());
        self.instance_callables
            .insert(interface.name.clone(), interface.instance_callable());
    }

    pub fn insert(&mut self, callable: Callable) {
        let target = if callable.is_instance() {
            &mut self.instance_callables
        } else {
            &mut self.callables
        };
        target.insert(callable.name().to_string(), callable);
    }
}

impl CallableRegistry for CallableSet {
    fn callable(&self, name: &str) -> Option<Callable> {
        self.callables.get(name).cloned()
    }

    fn instance_callable(&self, name: &str) -> Option<Callable> {
        self.instance_callables.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSet;
    use crate::testing::{formal, html, node, string};
    use crate::types::{AttributeValidator, BundleType};

    fn template() -> Template {
        Template::new(
            node("template"),
            "com.example.Card",
            html(),
            vec![
                Parameter::new(formal("title", Type::Content(html()))),
                Parameter::new(formal("body", Type::Content(html())).consuming_content()),
                Parameter::new(formal("selected", Type::Boolean)),
            ],
            string(""),
        )
    }

    #[test]
    fn test_names() {
        let template = template();
        assert_eq!(template.simple_name(), "Card");
        assert_eq!(template.package(), Some("com.example"));
    }

    #[test]
    fn test_callable_views() {
        let template = template();
        let callable = template.callable();
        assert!(!callable.is_instance());
        assert!(callable.parameter(INSTANCE_PARAM_NAME).is_none());
        assert_eq!(
            callable.content_consuming_parameter().map(|p| p.primary_name.as_str()),
            Some("body")
        );

        let instance = template.instance_callable();
        assert!(instance.is_instance());
        match &instance.parameter(INSTANCE_PARAM_NAME).unwrap().ty {
            Type::Instance(name) => assert_eq!(name, "com.example.Card"),
            other => panic!("Expected instance type, got {:?}", other),
        }
        assert_eq!(instance.parameters().len(), 4);
    }

    #[test]
    fn test_bundle_parameter_answers_to_attribute_names() {
        let bundle = formal(
            "attrs",
            Type::Bundle(BundleType::new(
                html(),
                [AttributeValidator::new("id"), AttributeValidator::new("class")],
            )),
        );
        let callable = Callable::new("Box", html(), vec![bundle], CallableKind::Static);
        assert_eq!(callable.parameter("class").unwrap().primary_name, "attrs");
        assert!(callable.parameter("attrs").is_none());
        assert!(callable.parameter_by_primary("attrs").is_some());
        assert!(callable.parameters()[0].has_default());
    }

    #[test]
    fn test_validate_parameters() {
        let callable = Callable::new(
            "Bad",
            html(),
            vec![
                formal("a", Type::Boolean),
                formal("a", Type::Boolean),
                formal("x", Type::Content(html())).consuming_content(),
                formal("y", Type::Content(html())).consuming_content(),
            ],
            CallableKind::Static,
        );
        let mut alerts = AlertSet::new();
        callable.validate_parameters(&mut alerts);
        let kinds: Vec<_> = alerts.iter().map(|alert| alert.kind.name()).collect();
        assert_eq!(kinds, ["duplicate-parameter-name", "too-many-content-parameters"]);
    }

    #[test]
    fn test_interface_params_cannot_have_defaults() {
        let interface = Interface {
            node: node("interface"),
            name: "com.example.Widget".to_string(),
            schema: html(),
            parameters: vec![Parameter::new(formal("size", Type::Boolean).with_default())],
        };
        let mut alerts = AlertSet::new();
        interface.validate(&mut alerts);
        assert_eq!(alerts.len(), 1);
        assert!(interface.callable().is_instance());
    }

    #[test]
    fn test_registry_lookup() {
        let mut callables = CallableSet::new();
        callables.insert_template(&template());
        assert!(callables.callable("com.example.Card").is_some());
        assert!(callables.instance_callable("com.example.Card").unwrap().is_instance());
        assert!(callables.callable("com.example.Missing").is_none());
    }
}
