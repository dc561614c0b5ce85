//! Alerts: user-facing compilation problems.
//!
//! Passes never fail on bad template input. They append an `Alert` to an
//! `AlertSink`, substitute a best-effort value and keep going, so one compile
//! reports as many independent problems as possible. Whether a compile failed
//! is decided afterwards by looking for an alert of `Severity::Error`.

use crate::source::SourcePosition;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// What went wrong. Each kind knows its default severity and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AlertKind {
    // binding
    CallableNotFound { callee: String },
    ContentNotAllowed { callee: String },
    DuplicateParameterValue { callee: String, name: String },

    // call and template validation
    BadParameter { callee: String, name: String },
    MissingAttribute { name: String },
    RequiredAttributeHasCondition { name: String },
    DuplicateAttribute { bundle: String, name: String },
    UnknownAttribute { name: String },
    InvalidAttrBundle { bundle: String },
    MismatchedAttributeValidators { name: String, bundle: String },
    InvalidParameterFailedRegex { callee: String, name: String, pattern: String, value: String },
    InvalidAttributeValue { value: String },
    DuplicateParameterName { name: String },
    TooManyContentParameters { name: String },
    InterfaceParamHasDefault { name: String },
    InterfaceParamHasConstructor { name: String },
    ConflictingVarName { name: String },

    // escaping
    TypeError { expected: String, found: String },
    UntranslatableMessage { content_type: String },

    // placeholders
    PlaceholderMissingEnd { name: String },
    PlaceholderEndWithoutStart,
    EmptyPlaceholder { name: String },
    PlaceholderRequiresExample { name: String },

    // messages
    TooManyDynamicPlaceholders,
    DynamicValueOutsidePlaceholder { node: String },
    /// Without a parent the node is misplaced where it stands, e.g. a
    /// placeholder outside any message.
    BadNodePlacement { node: String, parent: Option<String> },

    // translation checks
    UnextractableContent { node: String },
    UnnecessaryNomsg { node: String },

    // code generation
    IllegalExpression { language: String, code: String },
    IllegalOperator { language: String, operator: String },
    MissingExpression { language: String },
    LoopMissingIterableAndIterator { var: String },
    NoMessageSource,
    InvalidConstruction { message: String },
}

impl AlertKind {
    /// Stable kebab-case name, used by `AlertPolicy` and report codes.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallableNotFound { .. } => "callable-not-found",
            Self::ContentNotAllowed { .. } => "content-not-allowed",
            Self::DuplicateParameterValue { .. } => "duplicate-parameter-value",
            Self::BadParameter { .. } => "bad-parameter",
            Self::MissingAttribute { .. } => "missing-attribute",
            Self::RequiredAttributeHasCondition { .. } => "required-attribute-has-condition",
            Self::DuplicateAttribute { .. } => "duplicate-attribute",
            Self::UnknownAttribute { .. } => "unknown-attribute",
            Self::InvalidAttrBundle { .. } => "invalid-attr-bundle",
            Self::MismatchedAttributeValidators { .. } => "mismatched-attribute-validators",
            Self::InvalidParameterFailedRegex { .. } => "invalid-parameter-failed-regex",
            Self::InvalidAttributeValue { .. } => "invalid-attribute-value",
            Self::DuplicateParameterName { .. } => "duplicate-parameter-name",
            Self::TooManyContentParameters { .. } => "too-many-content-parameters",
            Self::InterfaceParamHasDefault { .. } => "interface-param-has-default",
            Self::InterfaceParamHasConstructor { .. } => "interface-param-has-constructor",
            Self::ConflictingVarName { .. } => "conflicting-var-name",
            Self::TypeError { .. } => "type-error",
            Self::UntranslatableMessage { .. } => "untranslatable-message",
            Self::PlaceholderMissingEnd { .. } => "placeholder-missing-end",
            Self::PlaceholderEndWithoutStart => "placeholder-end-without-start",
            Self::EmptyPlaceholder { .. } => "empty-placeholder",
            Self::PlaceholderRequiresExample { .. } => "placeholder-requires-example",
            Self::TooManyDynamicPlaceholders => "too-many-dynamic-placeholders",
            Self::DynamicValueOutsidePlaceholder { .. } => "dynamic-value-outside-placeholder",
            Self::BadNodePlacement { .. } => "bad-node-placement",
            Self::UnextractableContent { .. } => "unextractable-content",
            Self::UnnecessaryNomsg { .. } => "unnecessary-nomsg",
            Self::IllegalExpression { .. } => "illegal-expression",
            Self::IllegalOperator { .. } => "illegal-operator",
            Self::MissingExpression { .. } => "missing-expression",
            Self::LoopMissingIterableAndIterator { .. } => "loop-missing-iterable-and-iterator",
            Self::NoMessageSource => "no-message-source",
            Self::InvalidConstruction { .. } => "invalid-construction",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            Self::PlaceholderRequiresExample { .. } => Severity::Warning,
            Self::EmptyPlaceholder { .. } => Severity::Warning,
            Self::UnnecessaryNomsg { .. } => Severity::Warning,
            Self::UnextractableContent { .. } => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallableNotFound { callee } => write!(f, "callable not found: {callee}"),
            Self::ContentNotAllowed { callee } => {
                write!(f, "{callee} does not accept content")
            }
            Self::DuplicateParameterValue { callee, name } => write!(
                f,
                "parameter '{name}' of {callee} is given both as an attribute and as content"
            ),
            Self::BadParameter { callee, name } => {
                write!(f, "{callee} has no parameter named '{name}'")
            }
            Self::MissingAttribute { name } => write!(f, "missing required attribute '{name}'"),
            Self::RequiredAttributeHasCondition { name } => {
                write!(f, "required attribute '{name}' must not be conditional")
            }
            Self::DuplicateAttribute { bundle, name } => write!(
                f,
                "attribute '{name}' is given directly and through bundle '{bundle}'"
            ),
            Self::UnknownAttribute { name } => write!(f, "unknown attribute '{name}'"),
            Self::InvalidAttrBundle { bundle } => {
                write!(f, "'{bundle}' is not an attribute bundle parameter")
            }
            Self::MismatchedAttributeValidators { name, bundle } => write!(
                f,
                "attribute '{name}' from bundle '{bundle}' has a different validator"
            ),
            Self::InvalidParameterFailedRegex {
                callee,
                name,
                pattern,
                value,
            } => write!(
                f,
                "value '{value}' for parameter '{name}' of {callee} does not match /{pattern}/"
            ),
            Self::InvalidAttributeValue { value } => write!(f, "invalid attribute value '{value}'"),
            Self::DuplicateParameterName { name } => write!(f, "duplicate parameter name '{name}'"),
            Self::TooManyContentParameters { name } => write!(
                f,
                "parameter '{name}' consumes content but another parameter already does"
            ),
            Self::InterfaceParamHasDefault { name } => {
                write!(f, "interface parameter '{name}' cannot have a default value")
            }
            Self::InterfaceParamHasConstructor { name } => {
                write!(f, "interface parameter '{name}' cannot have a constructor")
            }
            Self::ConflictingVarName { name } => {
                write!(f, "variable '{name}' conflicts with an enclosing variable")
            }
            Self::TypeError { expected, found } => {
                write!(f, "type error: expected {expected} content, found {found}")
            }
            Self::UntranslatableMessage { content_type } => {
                write!(f, "{content_type} content cannot be translated")
            }
            Self::PlaceholderMissingEnd { name } => {
                write!(f, "placeholder '{name}' is never closed")
            }
            Self::PlaceholderEndWithoutStart => write!(f, "placeholder end without a start"),
            Self::EmptyPlaceholder { name } => write!(f, "placeholder '{name}' is empty"),
            Self::PlaceholderRequiresExample { name } => {
                write!(f, "placeholder '{name}' requires an example")
            }
            Self::TooManyDynamicPlaceholders => {
                write!(f, "a message can have at most 9 dynamic placeholders")
            }
            Self::DynamicValueOutsidePlaceholder { node } => {
                write!(f, "dynamic {node} in a message must be inside a placeholder")
            }
            Self::BadNodePlacement { node, parent } => match parent {
                Some(parent) => write!(f, "{node} is not allowed inside {parent}"),
                None => write!(f, "{node} is not allowed here"),
            },
            Self::UnextractableContent { node } => write!(f, "unextractable {node}"),
            Self::UnnecessaryNomsg { node } => {
                write!(f, "{node} is unnecessary and should be removed")
            }
            Self::IllegalExpression { language, code } => {
                write!(f, "illegal {language} expression: {code}")
            }
            Self::IllegalOperator { language, operator } => {
                write!(f, "operator '{operator}' is not allowed in {language} expressions")
            }
            Self::MissingExpression { language } => write!(f, "missing {language} expression"),
            Self::LoopMissingIterableAndIterator { var } => {
                write!(f, "loop over '{var}' has neither an iterable nor an iterator")
            }
            Self::NoMessageSource => {
                write!(f, "templates with messages need codegen.message_source to be set")
            }
            Self::InvalidConstruction { message } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub position: SourcePosition,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: AlertKind,
}

impl Alert {
    pub fn new(position: SourcePosition, kind: AlertKind) -> Self {
        Self {
            position,
            severity: kind.default_severity(),
            kind,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.position, self.severity, self.kind)
    }
}

/// Append-only destination for alerts.
pub trait AlertSink {
    fn add(&mut self, alert: Alert);

    fn alert(&mut self, position: &SourcePosition, kind: AlertKind) {
        self.add(Alert::new(position.clone(), kind));
    }
}

/// Adjusts alerts as they are added: promote warnings, drop ignored kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertPolicy {
    pub warnings_as_errors: bool,
    pub ignore: Vec<String>,
}

impl AlertPolicy {
    pub fn apply(&self, mut alert: Alert) -> Option<Alert> {
        if self.ignore.iter().any(|name| name == alert.kind.name()) {
            return None;
        }
        if self.warnings_as_errors && alert.severity == Severity::Warning {
            alert.severity = Severity::Error;
        }
        Some(alert)
    }
}

/// Collected alerts of one compilation.
#[derive(Debug, Clone, Default)]
pub struct AlertSet {
    policy: AlertPolicy,
    alerts: Vec<Alert>,
}

impl AlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: AlertPolicy) -> Self {
        Self {
            policy,
            alerts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.alerts
            .iter()
            .any(|alert| alert.severity >= Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|alert| alert.severity >= Severity::Error)
    }

    pub fn into_vec(self) -> Vec<Alert> {
        self.alerts
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.alerts)
    }
}

impl AlertSink for AlertSet {
    fn add(&mut self, alert: Alert) {
        match self.policy.apply(alert) {
            Some(alert) => {
                log::trace!("alert: {alert}");
                self.alerts.push(alert);
            }
            None => log::trace!("alert ignored by policy"),
        }
    }
}

impl<'a> IntoIterator for &'a AlertSet {
    type Item = &'a Alert;
    type IntoIter = std::slice::Iter<'a, Alert>;

    fn into_iter(self) -> Self::IntoIter {
        self.alerts.iter()
    }
}
