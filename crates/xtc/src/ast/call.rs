//! Calls and their binding stages.
//!
//! A call starts `Unbound` (the parser only knows the callee's name), becomes
//! `Bound` once the binder resolves the callee, and `Validated` once its
//! attributes are checked against the callee's parameters. Stages only move
//! forward. Each pass accepts exactly the stage it expects.

use super::{Attribute, Expression};
use crate::callable::Callable;
use crate::schema::SchemaTag;
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallStage {
    Unbound,
    Bound,
    Validated,
}

impl fmt::Display for CallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unbound => "unbound",
            Self::Bound => "bound",
            Self::Validated => "validated",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundCall {
    pub callee: String,
    pub attributes: IndexMap<String, Attribute>,
    /// Names of the caller's bundle parameters forwarded to the callee.
    pub attr_bundles: Vec<String>,
    /// Body of the call element, for the callee's content parameter.
    pub content: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCall {
    pub callee: Callable,
    pub attributes: IndexMap<String, Attribute>,
    pub attr_bundles: Vec<String>,
}

/// Attributes are keyed by the callee's primary parameter names. Bundle
/// parameters hold an `AttrBundleParam`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCall {
    pub callee: Callable,
    pub attributes: IndexMap<String, Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Unbound(UnboundCall),
    Bound(BoundCall),
    Validated(ValidatedCall),
}

impl Call {
    pub fn stage(&self) -> CallStage {
        match self {
            Self::Unbound(_) => CallStage::Unbound,
            Self::Bound(_) => CallStage::Bound,
            Self::Validated(_) => CallStage::Validated,
        }
    }

    pub fn callee_name(&self) -> &str {
        match self {
            Self::Unbound(call) => &call.callee,
            Self::Bound(call) => call.callee.name(),
            Self::Validated(call) => call.callee.name(),
        }
    }

    /// Unknown until bound, then the callee's schema.
    pub fn schema_tag(&self) -> SchemaTag {
        match self {
            Self::Unbound(_) => SchemaTag::Untyped,
            Self::Bound(call) => SchemaTag::Known(call.callee.schema().clone()),
            Self::Validated(call) => SchemaTag::Known(call.callee.schema().clone()),
        }
    }

    pub fn attributes(&self) -> &IndexMap<String, Attribute> {
        match self {
            Self::Unbound(call) => &call.attributes,
            Self::Bound(call) => &call.attributes,
            Self::Validated(call) => &call.attributes,
        }
    }

    /// Same call with other attributes, at the same stage.
    pub fn with_attributes(&self, attributes: IndexMap<String, Attribute>) -> Self {
        match self {
            Self::Unbound(call) => Self::Unbound(UnboundCall {
                attributes,
                ..call.clone()
            }),
            Self::Bound(call) => Self::Bound(BoundCall {
                attributes,
                ..call.clone()
            }),
            Self::Validated(call) => Self::Validated(ValidatedCall {
                callee: call.callee.clone(),
                attributes,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::CallableKind;
    use crate::testing::{html, node, string};

    #[test]
    fn test_stage_order_and_schema() {
        let unbound = Call::Unbound(UnboundCall {
            callee: "com.example.Card".to_string(),
            attributes: IndexMap::new(),
            attr_bundles: Vec::new(),
            content: string(""),
        });
        assert_eq!(unbound.stage(), CallStage::Unbound);
        assert_eq!(unbound.schema_tag(), SchemaTag::Untyped);

        let callee = Callable::new("com.example.Card", html(), vec![], CallableKind::Static);
        let bound = Call::Bound(BoundCall {
            callee,
            attributes: IndexMap::new(),
            attr_bundles: Vec::new(),
        });
        assert!(bound.stage() > unbound.stage());
        assert_eq!(bound.schema_tag(), SchemaTag::Known(html()));
        assert_eq!(bound.callee_name(), "com.example.Card");

        let expression = Expression::call(node("call"), bound);
        assert_eq!(expression.known_schema(), Some(&html()));
        assert_eq!(expression.kind_name(), "BoundCall");
    }

    #[test]
    fn test_with_attributes_keeps_stage() {
        let call = Call::Unbound(UnboundCall {
            callee: "A".to_string(),
            attributes: IndexMap::new(),
            attr_bundles: vec!["attrs".to_string()],
            content: string("body"),
        });
        let mut attributes = IndexMap::new();
        attributes.insert(
            "x".to_string(),
            Attribute::new(node("x"), "x", string("1")),
        );
        let updated = call.with_attributes(attributes);
        assert_eq!(updated.stage(), CallStage::Unbound);
        assert_eq!(updated.attributes().len(), 1);
        match updated {
            Call::Unbound(call) => assert_eq!(call.attr_bundles, ["attrs"]),
            other => panic!("Expected UnboundCall, got {:?}", other),
        }
    }
}
