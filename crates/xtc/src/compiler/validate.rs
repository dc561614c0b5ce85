//! Bound → Validated: checks call attributes against the callee's
//! parameters, coerces literal values and groups bundle attributes.
//!
//! Also checks the template's own declarations: parameter names, variable
//! shadowing by abbreviations and attribute bundles forwarded to elements.

use super::TemplatePass;
use crate::alert::{AlertKind, AlertSink};
use crate::ast::{Attribute, BoundCall, Call, Expression, ExpressionKind, OutputElement, ValidatedCall};
use crate::callable::{Callable, FormalParameter, Template};
use crate::schema::SchemaRegistry;
use crate::source::SourcePosition;
use crate::types::{AttributeFlag, AttributeValidator, BundleType, Type};
use crate::visit::{Rewriter, rewrite_children, unexpected_node};
use indexmap::IndexMap;
use std::collections::HashSet;

pub struct Validator<'a> {
    template: &'a Template,
    schemas: &'a dyn SchemaRegistry,
    alerts: &'a mut dyn AlertSink,
    /// Template parameters and enclosing abbreviations.
    var_names: Vec<String>,
    validated: usize,
}

impl<'a> Validator<'a> {
    pub fn new(
        template: &'a Template,
        schemas: &'a dyn SchemaRegistry,
        alerts: &'a mut dyn AlertSink,
    ) -> Self {
        Self {
            template,
            schemas,
            alerts,
            var_names: Vec::new(),
            validated: 0,
        }
    }

    pub fn validated_calls(&self) -> usize {
        self.validated
    }

    /// Bundle type of the template parameter `name`, or an alert.
    fn forwarded_bundle(&mut self, position: &SourcePosition, name: &str) -> Option<&'a BundleType> {
        let template: &'a Template = self.template;
        match template.parameter(name).map(|parameter| &parameter.formal.ty) {
            Some(Type::Bundle(bundle)) => Some(bundle),
            _ => {
                self.alerts.alert(
                    position,
                    AlertKind::InvalidAttrBundle {
                        bundle: name.to_string(),
                    },
                );
                None
            }
        }
    }

    fn check_element(&mut self, expr: &Expression, element: &OutputElement) {
        for bundle in &element.attr_bundles {
            self.forwarded_bundle(expr.position(), bundle);
        }
    }

    /// Turns a literal value into a value of the parameter's type.
    fn coerce(
        &mut self,
        callee: &Callable,
        parameter: &FormalParameter,
        name: &str,
        attribute: Attribute,
    ) -> Attribute {
        let Some(value) = attribute.value.object_value() else {
            return attribute;
        };
        if !parameter.regex_matches(value) {
            self.alerts.alert(
                attribute.value.position(),
                AlertKind::InvalidParameterFailedRegex {
                    callee: callee.name().to_string(),
                    name: name.to_string(),
                    pattern: parameter
                        .pattern
                        .as_ref()
                        .map(|pattern| pattern.as_str().to_string())
                        .unwrap_or_default(),
                    value: value.to_string(),
                },
            );
        }
        let coerced = if parameter.has_constructor {
            Expression::constructed(
                attribute.value.node.clone(),
                value,
                callee.clone(),
                parameter.primary_name.clone(),
            )
        } else {
            parameter
                .ty
                .parse_object_constant(name, &attribute.value, &mut *self.alerts)
        };
        attribute.with_value(coerced)
    }

    fn validate_call(&mut self, expr: &Expression, call: &BoundCall) -> Expression {
        let callee = &call.callee;
        let position = expr.position();

        // attributes given directly, by primary name
        let mut direct: IndexMap<String, Attribute> = IndexMap::new();
        // attributes per bundle parameter
        let mut bundles: IndexMap<String, IndexMap<String, Attribute>> = callee
            .parameters()
            .iter()
            .filter(|parameter| matches!(parameter.ty, Type::Bundle(_)))
            .map(|parameter| (parameter.primary_name.clone(), IndexMap::new()))
            .collect();

        for (name, attribute) in &call.attributes {
            let Some(parameter) = callee.parameter(name) else {
                self.alerts.alert(
                    attribute.value.position(),
                    AlertKind::BadParameter {
                        callee: callee.name().to_string(),
                        name: name.clone(),
                    },
                );
                continue;
            };
            let attribute = self.rewrite_attribute(attribute);
            let attribute = self.coerce(callee, parameter, name, attribute);
            match &parameter.ty {
                Type::Bundle(bundle) => {
                    let inner_schema = bundle
                        .validator(name)
                        .and_then(|validator| validator.content_type.as_deref())
                        .and_then(|content_type| self.schemas.from_content_type(content_type));
                    let attribute = match inner_schema {
                        Some(schema) => attribute.with_inner_schema(schema),
                        None => attribute,
                    };
                    bundles
                        .entry(parameter.primary_name.clone())
                        .or_default()
                        .insert(name.clone(), attribute);
                }
                _ => {
                    direct.insert(parameter.primary_name.clone(), attribute);
                }
            }
        }

        self.check_bundle_attributes(position, callee, &bundles, &call.attr_bundles);

        let single_bundle = bundles.len() == 1;
        let mut attributes = IndexMap::with_capacity(callee.parameters().len());
        for parameter in callee.parameters() {
            let name = &parameter.primary_name;
            match &parameter.ty {
                Type::Bundle(bundle) => {
                    let supplied = bundles.shift_remove(name).unwrap_or_default();
                    // one bundle parameter takes every forwarded attribute
                    let include_attrs = if single_bundle {
                        Vec::new()
                    } else {
                        bundle.attributes.keys().cloned().collect()
                    };
                    let value = Expression::attr_bundle(
                        expr.node.clone(),
                        bundle.schema.clone(),
                        include_attrs,
                        supplied,
                        call.attr_bundles.clone(),
                    );
                    attributes.insert(name.clone(), Attribute::new(expr.node.clone(), name.clone(), value));
                }
                _ => match direct.shift_remove(name) {
                    Some(attribute) => {
                        if !parameter.has_default() && attribute.condition.is_some() {
                            self.alerts.alert(
                                attribute.value.position(),
                                AlertKind::RequiredAttributeHasCondition { name: name.clone() },
                            );
                        }
                        attributes.insert(name.clone(), attribute);
                    }
                    None if !parameter.has_default() => self.alerts.alert(
                        position,
                        AlertKind::MissingAttribute { name: name.clone() },
                    ),
                    None => {}
                },
            }
        }

        self.validated += 1;
        log::trace!("validated {} at {}", callee.name(), expr.position());
        Expression::call(
            expr.node.clone(),
            Call::Validated(ValidatedCall {
                callee: callee.clone(),
                attributes,
            }),
        )
    }

    /// Checks bundle attributes given directly and through forwarded
    /// bundles of the calling template.
    fn check_bundle_attributes(
        &mut self,
        position: &SourcePosition,
        callee: &Callable,
        bundles: &IndexMap<String, IndexMap<String, Attribute>>,
        forwarded: &[String],
    ) {
        // validators of bundle attributes not given directly
        let mut remaining: IndexMap<&str, &AttributeValidator> = IndexMap::new();
        for parameter in callee.parameters() {
            if let Type::Bundle(bundle) = &parameter.ty {
                remaining.extend(bundle.attributes.iter().map(|(name, validator)| (name.as_str(), validator)));
            }
        }
        let allowed: HashSet<&str> = remaining.keys().copied().collect();

        for (name, attribute) in bundles.values().flatten() {
            if let Some(validator) = remaining.shift_remove(name.as_str()) {
                if attribute.condition.is_some() && validator.is_flag_set(AttributeFlag::Required) {
                    self.alerts.alert(
                        attribute.value.position(),
                        AlertKind::RequiredAttributeHasCondition { name: name.clone() },
                    );
                }
            }
        }

        let mut found: HashSet<&str> = HashSet::new();
        for bundle_name in forwarded {
            let Some(bundle) = self.forwarded_bundle(position, bundle_name) else {
                continue;
            };
            for (name, validator) in &bundle.attributes {
                match remaining.get(name.as_str()) {
                    None if allowed.contains(name.as_str()) => self.alerts.alert(
                        position,
                        AlertKind::DuplicateAttribute {
                            bundle: bundle_name.clone(),
                            name: name.clone(),
                        },
                    ),
                    None => self.alerts.alert(
                        position,
                        AlertKind::UnknownAttribute { name: name.clone() },
                    ),
                    Some(expected) if *expected != validator => self.alerts.alert(
                        position,
                        AlertKind::MismatchedAttributeValidators {
                            name: name.clone(),
                            bundle: bundle_name.clone(),
                        },
                    ),
                    Some(_) => {
                        found.insert(name.as_str());
                    }
                }
            }
        }

        for (name, validator) in &remaining {
            if validator.is_flag_set(AttributeFlag::Required) && !found.contains(name) {
                self.alerts.alert(
                    position,
                    AlertKind::MissingAttribute {
                        name: name.to_string(),
                    },
                );
            }
        }
    }
}

impl Rewriter for Validator<'_> {
    fn rewrite_node(&mut self, expr: &Expression) -> Expression {
        match &expr.kind {
            ExpressionKind::Call(Call::Bound(call)) => self.validate_call(expr, call),
            ExpressionKind::Call(Call::Unbound(_) | Call::Validated(_)) => {
                unexpected_node("validator", expr)
            }
            ExpressionKind::Abbr { name, .. } => {
                if self.var_names.contains(name) {
                    self.alerts.alert(
                        expr.position(),
                        AlertKind::ConflictingVarName { name: name.clone() },
                    );
                }
                self.var_names.push(name.clone());
                let result = rewrite_children(self, expr);
                self.var_names.pop();
                result
            }
            ExpressionKind::OutputElement(element) => {
                self.check_element(expr, element);
                rewrite_children(self, expr)
            }
            _ => rewrite_children(self, expr),
        }
    }
}

impl TemplatePass for Validator<'_> {
    fn rewrite_content(&mut self, template: &Template) -> Expression {
        template.callable().validate_parameters(&mut *self.alerts);
        self.var_names = template
            .parameters
            .iter()
            .map(|parameter| parameter.name().to_string())
            .collect();
        self.rewrite(&template.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSet;
    use crate::callable::Parameter;
    use crate::schema::SchemaSet;
    use crate::testing::{attribute, callable, formal, html, javascript, native, node, string};
    use crate::types::{NativeType, Pattern};

    fn bound_call(callee: Callable, attributes: Vec<Attribute>, forwarded: &[&str]) -> Expression {
        Expression::call(
            node("call"),
            Call::Bound(BoundCall {
                callee,
                attributes: attributes
                    .into_iter()
                    .map(|attribute| (attribute.name.clone(), attribute))
                    .collect(),
                attr_bundles: forwarded.iter().map(|name| name.to_string()).collect(),
            }),
        )
    }

    fn link_bundle() -> BundleType {
        BundleType::new(
            html(),
            [
                AttributeValidator::new("href").with_flag(AttributeFlag::Required),
                AttributeValidator::new("onclick").with_content_type("text/javascript"),
                AttributeValidator::new("hidden").with_flag(AttributeFlag::Boolean),
            ],
        )
    }

    fn validate_in(template: &Template) -> (Template, AlertSet) {
        let schemas = SchemaSet::builtin();
        let mut alerts = AlertSet::new();
        let result = Validator::new(template, &schemas, &mut alerts).apply(template);
        (result, alerts)
    }

    fn validate(content: Expression) -> (Expression, AlertSet) {
        let template = Template::new(node("t"), "com.example.Page", html(), vec![], content);
        let (result, alerts) = validate_in(&template);
        (result.content, alerts)
    }

    fn validated(expr: &Expression) -> &ValidatedCall {
        match &expr.kind {
            ExpressionKind::Call(Call::Validated(call)) => call,
            other => panic!("Expected ValidatedCall, got {:?}", other),
        }
    }

    fn kinds(alerts: &AlertSet) -> Vec<&AlertKind> {
        alerts.iter().map(|alert| &alert.kind).collect()
    }

    #[test]
    fn test_attributes_follow_parameter_order() {
        let callee = callable(
            "com.example.Card",
            vec![
                formal("title", Type::Native(NativeType::new("String"))),
                formal("wide", Type::Boolean),
                formal("body", Type::Content(html())),
            ],
        );
        let call = bound_call(
            callee,
            vec![
                attribute("body", string("b")),
                attribute("title", native("t")),
            ],
            &[],
        );
        let (result, alerts) = validate(call);
        assert!(alerts.is_empty(), "{:?}", kinds(&alerts));
        assert_eq!(validated(&result).attributes.keys().collect::<Vec<_>>(), ["title", "body"]);
    }

    #[test]
    fn test_missing_and_conditional_required_attributes() {
        let callee = callable(
            "com.example.Card",
            vec![
                formal("title", Type::Native(NativeType::new("String"))),
                formal("body", Type::Content(html())),
            ],
        );
        let call = bound_call(
            callee,
            vec![attribute("title", native("t")).with_condition(native("c"))],
            &[],
        );
        let (_, alerts) = validate(call);
        assert!(matches!(
            kinds(&alerts).as_slice(),
            [
                AlertKind::RequiredAttributeHasCondition { name: first },
                AlertKind::MissingAttribute { name: second },
            ] if first == "title" && second == "body"
        ));
    }

    #[test]
    fn test_object_constants_are_coerced() {
        let pattern = Pattern::new("^[0-9]+$").unwrap();
        let callee = callable(
            "com.example.Card",
            vec![
                formal("count", Type::Native(NativeType::new("int"))).with_pattern(pattern),
                formal("wide", Type::Boolean),
                formal("color", Type::Native(NativeType::new("Color"))).with_constructor(),
            ],
        );
        let call = bound_call(
            callee,
            vec![
                attribute("count", Expression::object(node("count"), "x1")),
                attribute("wide", Expression::object(node("wide"), "wide")),
                attribute("color", Expression::object(node("color"), "red")),
            ],
            &[],
        );
        let (result, alerts) = validate(call);
        assert!(matches!(
            kinds(&alerts).as_slice(),
            [AlertKind::InvalidParameterFailedRegex { value, .. }] if value == "x1"
        ));
        let attributes = &validated(&result).attributes;
        match &attributes["count"].value.kind {
            ExpressionKind::ObjectConstant { ty: Some(Type::Native(_)), .. } => {}
            other => panic!("Expected typed ObjectConstant, got {:?}", other),
        }
        assert!(matches!(
            attributes["wide"].value.kind,
            ExpressionKind::BooleanConstant { value: true }
        ));
        assert_eq!(attributes["color"].value.kind_name(), "ConstructedConstant");
    }

    #[test]
    fn test_bundle_attributes_are_grouped() {
        let callee = callable("com.example.Link", vec![formal("attrs", Type::Bundle(link_bundle()))]);
        let call = bound_call(
            callee,
            vec![
                attribute("href", string("/home")),
                attribute("onclick", string("go()")),
                attribute("hidden", Expression::object(node("hidden"), "hidden")),
            ],
            &[],
        );
        let (result, alerts) = validate(call);
        assert!(alerts.is_empty(), "{:?}", kinds(&alerts));
        let attributes = &validated(&result).attributes;
        assert_eq!(attributes.keys().collect::<Vec<_>>(), ["attrs"]);
        let ExpressionKind::AttrBundleParam { include_attrs, attributes, .. } = &attributes["attrs"].value.kind else {
            panic!("Expected AttrBundleParam");
        };
        assert!(include_attrs.is_empty());
        assert_eq!(attributes["onclick"].inner_schema, Some(javascript()));
        assert!(matches!(
            attributes["hidden"].value.kind,
            ExpressionKind::BooleanConstant { value: true }
        ));
    }

    #[test]
    fn test_forwarded_bundles() {
        let callee = callable("com.example.Link", vec![formal("attrs", Type::Bundle(link_bundle()))]);
        let other_bundle = BundleType::new(
            html(),
            [
                AttributeValidator::new("href"),
                AttributeValidator::new("title"),
            ],
        );
        let template = Template::new(
            node("t"),
            "com.example.Page",
            html(),
            vec![
                Parameter::new(formal("mine", Type::Bundle(other_bundle))),
                Parameter::new(formal("label", Type::Native(NativeType::new("String")))),
            ],
            bound_call(
                callee,
                vec![attribute("href", string("/"))],
                &["mine", "label"],
            ),
        );
        let (_, alerts) = validate_in(&template);
        let kinds = kinds(&alerts);
        assert!(
            kinds.iter().any(|kind| matches!(kind, AlertKind::DuplicateAttribute { name, .. } if name == "href")),
            "{kinds:?}"
        );
        assert!(
            kinds.iter().any(|kind| matches!(kind, AlertKind::UnknownAttribute { name } if name == "title")),
            "{kinds:?}"
        );
        assert!(
            kinds.iter().any(|kind| matches!(kind, AlertKind::InvalidAttrBundle { bundle } if bundle == "label")),
            "{kinds:?}"
        );
    }

    #[test]
    fn test_required_bundle_attribute_missing() {
        let callee = callable("com.example.Link", vec![formal("attrs", Type::Bundle(link_bundle()))]);
        let (_, alerts) = validate(bound_call(callee, vec![], &[]));
        assert!(matches!(
            kinds(&alerts).as_slice(),
            [AlertKind::MissingAttribute { name }] if name == "href"
        ));
    }

    #[test]
    fn test_unknown_attribute_is_dropped() {
        let callee = callable("com.example.Rule", vec![]);
        let call = bound_call(callee, vec![attribute("size", string("2"))], &[]);
        let (result, alerts) = validate(call);
        assert!(validated(&result).attributes.is_empty());
        assert!(matches!(
            kinds(&alerts).as_slice(),
            [AlertKind::BadParameter { name, .. }] if name == "size"
        ));
    }

    #[test]
    fn test_abbr_conflicts() {
        let inner = Expression::abbr(
            node("abbr"),
            "x",
            Type::Native(NativeType::new("int")),
            native("1"),
            string(""),
        );
        let outer = Expression::abbr(
            node("abbr"),
            "x",
            Type::Native(NativeType::new("int")),
            native("2"),
            inner,
        );
        let sibling = Expression::abbr(
            node("abbr"),
            "title",
            Type::Native(NativeType::new("String")),
            native("\"a\""),
            string(""),
        );
        let template = Template::new(
            node("t"),
            "com.example.Page",
            html(),
            vec![Parameter::new(formal("title", Type::Native(NativeType::new("String"))))],
            Expression::concat(node("c"), crate::schema::SchemaTag::Untyped, vec![outer, sibling]),
        );
        let (_, alerts) = validate_in(&template);
        assert_eq!(alerts.len(), 2, "{:?}", kinds(&alerts));
        assert!(kinds(&alerts)
            .iter()
            .all(|kind| matches!(kind, AlertKind::ConflictingVarName { .. })));
    }

    #[test]
    fn test_template_parameters_are_checked() {
        let template = Template::new(
            node("t"),
            "com.example.Page",
            html(),
            vec![
                Parameter::new(formal("a", Type::Boolean)),
                Parameter::new(formal("a", Type::Boolean)),
            ],
            string(""),
        );
        let (_, alerts) = validate_in(&template);
        assert!(matches!(
            kinds(&alerts).as_slice(),
            [AlertKind::DuplicateParameterName { name }] if name == "a"
        ));
    }

    #[test]
    #[should_panic(expected = "validator: unexpected UnboundCall")]
    fn test_unbound_call_is_a_defect() {
        validate(crate::testing::unbound_call("com.example.Rule", vec![], string("")));
    }
}
