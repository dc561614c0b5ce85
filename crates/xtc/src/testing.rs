//! Fixtures shared by unit tests.

use crate::ast::{Attribute, Call, Expression, NodeInfo, UnboundCall};
use crate::callable::{Callable, CallableKind, FormalParameter};
use crate::schema::{Schema, SchemaRegistry, SchemaSet, SchemaTag};
use crate::source::{SourceName, SourcePosition, Span};
use crate::types::{LanguageMap, Type};
use indexmap::IndexMap;

pub fn pos() -> SourcePosition {
    SourcePosition::new(SourceName::new("test.xtc"), 1, 1, Span::from(0..0))
}

pub fn node(display_name: &str) -> NodeInfo {
    NodeInfo::new(pos(), display_name)
}

fn builtin(content_type: &str) -> Schema {
    SchemaSet::builtin()
        .from_content_type(content_type)
        .expect("builtin schema")
}

pub fn html() -> Schema {
    builtin("text/html")
}

pub fn xhtml() -> Schema {
    builtin("application/xhtml+xml")
}

pub fn plaintext() -> Schema {
    builtin("text/plain")
}

pub fn javascript() -> Schema {
    builtin("text/javascript")
}

pub fn css() -> Schema {
    builtin("text/css")
}

pub fn string(value: &str) -> Expression {
    Expression::string(node("text"), SchemaTag::Untyped, value)
}

pub fn typed_string(value: &str, schema: Schema) -> Expression {
    Expression::string(node("text"), SchemaTag::Known(schema), value)
}

pub fn native(code: &str) -> Expression {
    Expression::native(node("expr"), LanguageMap::new(code), None)
}

pub fn formal(name: &str, ty: Type) -> FormalParameter {
    FormalParameter::new(node(name), name, ty)
}

pub fn callable(name: &str, parameters: Vec<FormalParameter>) -> Callable {
    Callable::new(name, html(), parameters, CallableKind::Static)
}

pub fn attribute(name: &str, value: Expression) -> Attribute {
    Attribute::new(node(name), name, value)
}

pub fn unbound_call(callee: &str, attributes: Vec<Attribute>, content: Expression) -> Expression {
    let attributes: IndexMap<String, Attribute> = attributes
        .into_iter()
        .map(|attribute| (attribute.name.clone(), attribute))
        .collect();
    Expression::call(
        node("call"),
        Call::Unbound(UnboundCall {
            callee: callee.to_string(),
            attributes,
            attr_bundles: Vec::new(),
            content,
        }),
    )
}
