//! Parameter types.
//!
//! A `Type` describes what a formal parameter accepts. It decides whether the
//! parameter has an implicit default and how a literal attribute value (an
//! `ObjectConstant`) is turned into a typed expression.

use crate::alert::{AlertKind, AlertSink};
use crate::ast::{Expression, NodeInfo};
use crate::codegen::OutputLanguage;
use crate::schema::{Schema, SchemaTag};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;

/// A regular expression constraint that must match a whole value.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

/// Text with optional per-output-language overrides, used for native types
/// and native code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageMap {
    default: Option<String>,
    overrides: IndexMap<OutputLanguage, String>,
}

impl LanguageMap {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
            overrides: IndexMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, language: OutputLanguage, text: impl Into<String>) -> Self {
        self.overrides.insert(language, text.into());
        self
    }

    pub fn get(&self, language: OutputLanguage) -> Option<&str> {
        self.overrides
            .get(&language)
            .or(self.default.as_ref())
            .map(String::as_str)
    }
}

/// Type of a native (output-language) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeType(pub LanguageMap);

impl NativeType {
    pub fn new(default: impl Into<String>) -> Self {
        NativeType(LanguageMap::new(default))
    }

    pub fn with_override(self, language: OutputLanguage, text: impl Into<String>) -> Self {
        NativeType(self.0.with(language, text))
    }

    pub fn get(&self, language: OutputLanguage) -> Option<&str> {
        self.0.get(language)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFlag {
    Required,
    Boolean,
}

/// Describes one attribute an element or attribute bundle accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValidator {
    pub name: String,
    /// Content type of the attribute value, when it differs from the
    /// surrounding markup (e.g. `onclick` holds JavaScript).
    pub content_type: Option<String>,
    pub flags: Vec<AttributeFlag>,
    pub pattern: Option<Pattern>,
}

impl AttributeValidator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            flags: Vec::new(),
            pattern: None,
        }
    }

    pub fn with_flag(mut self, flag: AttributeFlag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn is_flag_set(&self, flag: AttributeFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_valid_value(&self, value: &str) -> bool {
        self.pattern
            .as_ref()
            .is_none_or(|pattern| pattern.matches(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleType {
    pub schema: Schema,
    pub attributes: IndexMap<String, AttributeValidator>,
}

impl BundleType {
    pub fn new(schema: Schema, validators: impl IntoIterator<Item = AttributeValidator>) -> Self {
        let attributes = validators
            .into_iter()
            .map(|validator| (validator.name.clone(), validator))
            .collect();
        Self { schema, attributes }
    }

    pub fn validator(&self, name: &str) -> Option<&AttributeValidator> {
        self.attributes.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Boolean,
    Content(Schema),
    Native(NativeType),
    /// A group of markup attributes passed as one parameter.
    Bundle(BundleType),
    /// A callable template, passed by name.
    Template(String),
    /// An instance of a template or interface; type of `this`.
    Instance(String),
}

impl Type {
    /// Whether the type accepts a declared default value.
    pub fn takes_default_param(&self) -> bool {
        match self {
            Self::Boolean | Self::Content(_) | Self::Native(_) => true,
            Self::Bundle(_) | Self::Template(_) | Self::Instance(_) => false,
        }
    }

    pub fn only_allowed_in_param(&self) -> bool {
        matches!(self, Self::Bundle(_))
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    /// Schema values of this type are escaped into, if they are content.
    pub fn content_schema(&self) -> Option<&Schema> {
        match self {
            Self::Content(schema) => Some(schema),
            Self::Bundle(bundle) => Some(&bundle.schema),
            Self::Boolean | Self::Native(_) | Self::Template(_) | Self::Instance(_) => None,
        }
    }

    pub fn matches(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Boolean, Self::Boolean) => true,
            (Self::Content(this), Self::Content(that)) => this == that,
            (Self::Native(this), Self::Native(that)) => this == that,
            (Self::Bundle(this), Self::Bundle(that)) => this.attributes == that.attributes,
            (Self::Template(this), Self::Template(that)) => this == that,
            (Self::Instance(this), Self::Instance(that)) => this == that,
            _ => false,
        }
    }

    /// Value used when a parameter of this type is not supplied and has no
    /// declared default.
    pub fn default_value(&self, node: &NodeInfo) -> Option<Expression> {
        match self {
            Self::Boolean => Some(Expression::boolean(node.clone(), false)),
            Self::Content(_) | Self::Native(_) | Self::Template(_) | Self::Instance(_) => None,
            Self::Bundle(bundle) => Some(Expression::attr_bundle(
                node.clone(),
                bundle.schema.clone(),
                Vec::new(),
                IndexMap::new(),
                Vec::new(),
            )),
        }
    }

    /// Turns a literal attribute value into an expression of this type.
    ///
    /// `object` must be an `ObjectConstant`.
    pub fn parse_object_constant(
        &self,
        param_name: &str,
        object: &Expression,
        alerts: &mut dyn AlertSink,
    ) -> Expression {
        let value = object.object_value().unwrap_or_default();
        match self {
            Self::Boolean => Expression::boolean(object.node.clone(), true),
            Self::Content(_) => {
                Expression::string(object.node.clone(), SchemaTag::Untyped, value)
            }
            Self::Native(_) => object.with_object_type(self.clone()),
            Self::Bundle(bundle) => {
                let validator = bundle.validator(param_name);
                if !validator.is_some_and(|validator| validator.is_valid_value(value)) {
                    alerts.alert(
                        object.position(),
                        AlertKind::InvalidAttributeValue {
                            value: value.to_string(),
                        },
                    );
                }
                if validator.is_some_and(|validator| validator.is_flag_set(AttributeFlag::Boolean)) {
                    Expression::boolean(object.node.clone(), true)
                } else {
                    Expression::string(object.node.clone(), SchemaTag::Untyped, value)
                }
            }
            Self::Template(_) | Self::Instance(_) => object.with_object_type(self.clone()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::Content(schema) => write!(f, "{schema}"),
            Self::Native(native) => f.write_str(native.0.default.as_deref().unwrap_or("native")),
            Self::Bundle(bundle) => write!(f, "bundle<{}>", bundle.schema),
            Self::Template(name) => write!(f, "template {name}"),
            Self::Instance(name) => write!(f, "instance {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSet;
    use crate::ast::ExpressionKind;
    use crate::testing::{html, node};

    #[test]
    fn test_pattern_matches_whole_value() {
        let pattern = Pattern::new("[0-9]+").unwrap();
        assert!(pattern.matches("42"));
        assert!(!pattern.matches("42px"));
        assert_eq!(pattern, Pattern::new("[0-9]+").unwrap());
    }

    #[test]
    fn test_language_map_override() {
        let native = NativeType::new("int").with_override(OutputLanguage::JavaScript, "number");
        assert_eq!(native.get(OutputLanguage::Java), Some("int"));
        assert_eq!(native.get(OutputLanguage::JavaScript), Some("number"));
    }

    #[test]
    fn test_boolean_parses_to_true() {
        let mut alerts = AlertSet::new();
        let object = Expression::object(node("checked"), "checked");
        let parsed = Type::Boolean.parse_object_constant("checked", &object, &mut alerts);
        assert!(matches!(parsed.kind, ExpressionKind::BooleanConstant { value: true }));
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_native_parse_keeps_object_with_type() {
        let mut alerts = AlertSet::new();
        let object = Expression::object(node("count"), "3");
        let ty = Type::Native(NativeType::new("int"));
        let parsed = ty.parse_object_constant("count", &object, &mut alerts);
        match &parsed.kind {
            ExpressionKind::ObjectConstant { value, ty: Some(parsed_ty) } => {
                assert_eq!(value, "3");
                assert_eq!(parsed_ty, &ty);
            }
            other => panic!("Expected typed ObjectConstant, got {:?}", other),
        }
    }

    #[test]
    fn test_bundle_parse_validates_value() {
        let mut alerts = AlertSet::new();
        let bundle = Type::Bundle(BundleType::new(
            html(),
            [
                AttributeValidator::new("width").with_pattern(Pattern::new("[0-9]+").unwrap()),
                AttributeValidator::new("disabled").with_flag(AttributeFlag::Boolean),
            ],
        ));
        let width = Expression::object(node("width"), "wide");
        let parsed = bundle.parse_object_constant("width", &width, &mut alerts);
        assert!(matches!(parsed.kind, ExpressionKind::StringConstant { .. }));
        assert_eq!(alerts.len(), 1);

        let disabled = Expression::object(node("disabled"), "disabled");
        let parsed = bundle.parse_object_constant("disabled", &disabled, &mut alerts);
        assert!(matches!(parsed.kind, ExpressionKind::BooleanConstant { value: true }));
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_matches_by_name_and_schema() {
        assert!(Type::Template("a.B".into()).matches(&Type::Template("a.B".into())));
        assert!(!Type::Template("a.B".into()).matches(&Type::Instance("a.B".into())));
        assert!(Type::Content(html()).matches(&Type::Content(html())));
        assert!(!Type::Boolean.matches(&Type::Content(html())));
    }

    #[test]
    fn test_defaults() {
        let info = node("p");
        assert!(Type::Boolean.default_value(&info).is_some());
        assert!(Type::Content(html()).default_value(&info).is_none());
        assert!(!Type::Bundle(BundleType::new(html(), [])).takes_default_param());
    }
}
