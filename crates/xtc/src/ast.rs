//! The intermediate representation.
//!
//! An `Expression` is an immutable, reference-counted tree node: a source
//! position and display name (`NodeInfo`), a `SchemaTag` and one of the
//! `ExpressionKind` variants. Passes never mutate a tree. They build a new
//! one and reuse every subtree they did not change, so `Expression::ptr_eq`
//! tells whether a pass touched a node.
//!
//! Equality is structural and derived. Two expressions are equal when their
//! positions, schemas and contents are equal.
//!
//! Some schemas are derived from children (a loop has the schema of its
//! body) and are recomputed on every rebuild. The rest are stored.

mod call;

pub use call::{BoundCall, Call, CallStage, UnboundCall, ValidatedCall};

use crate::callable::Callable;
use crate::message::Message;
use crate::schema::{Schema, SchemaTag};
use crate::source::SourcePosition;
use crate::types::{LanguageMap, NativeType, Type};
use indexmap::IndexMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Position and human-readable name of a node, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub position: SourcePosition,
    pub display_name: Arc<str>,
}

impl NodeInfo {
    pub fn new(position: SourcePosition, display_name: impl Into<Arc<str>>) -> Self {
        Self {
            position,
            display_name: display_name.into(),
        }
    }
}

/// Construction rejected because the result would break a node invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    EmptyConditional,
    SchemaNotAllowed { expected: String, found: String },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyConditional => write!(f, "conditional needs at least one clause"),
            Self::SchemaNotAllowed { expected, found } => {
                write!(f, "{expected} conditional cannot contain {found} content")
            }
        }
    }
}

impl std::error::Error for ConstructionError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub node: NodeInfo,
    pub name: String,
    pub value: Expression,
    pub condition: Option<Expression>,
    /// Schema of the value when it differs from the surrounding content.
    pub inner_schema: Option<Schema>,
}

impl Attribute {
    pub fn new(node: NodeInfo, name: impl Into<String>, value: Expression) -> Self {
        Self {
            node,
            name: name.into(),
            value,
            condition: None,
            inner_schema: None,
        }
    }

    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_inner_schema(mut self, schema: Schema) -> Self {
        self.inner_schema = Some(schema);
        self
    }

    pub fn with_value(&self, value: Expression) -> Self {
        self.with_value_and_condition(value, self.condition.clone())
    }

    pub fn with_value_and_condition(&self, value: Expression, condition: Option<Expression>) -> Self {
        let same_condition = match (&self.condition, &condition) {
            (Some(old), Some(new)) => Expression::ptr_eq(old, new),
            (None, None) => true,
            _ => false,
        };
        if Expression::ptr_eq(&self.value, &value) && same_condition {
            return self.clone();
        }
        Self {
            value,
            condition,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub node: NodeInfo,
    pub predicate: Expression,
    pub expression: Expression,
}

impl Clause {
    pub fn new(node: NodeInfo, predicate: Expression, expression: Expression) -> Self {
        Self {
            node,
            predicate,
            expression,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional {
    pub clauses: Vec<Clause>,
    pub else_expression: Expression,
}

impl Conditional {
    /// Checks that there is at least one clause and that a known `schema`
    /// allows every branch.
    pub fn new(
        schema: &SchemaTag,
        clauses: Vec<Clause>,
        else_expression: Expression,
    ) -> Result<Self, ConstructionError> {
        if clauses.is_empty() {
            return Err(ConstructionError::EmptyConditional);
        }
        if let Some(schema) = schema.known() {
            let branches = clauses
                .iter()
                .map(|clause| &clause.expression)
                .chain(std::iter::once(&else_expression));
            for branch in branches {
                if !branch.schema.allowed_by(schema) {
                    return Err(ConstructionError::SchemaNotAllowed {
                        expected: schema.to_string(),
                        found: branch.schema.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            clauses,
            else_expression,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopExpression {
    pub var: String,
    pub ty: Type,
    /// Name bound to the zero-based index of the current item.
    pub key: Option<String>,
    pub iterable: Option<Expression>,
    pub iterator: Option<Expression>,
    pub subexpression: Expression,
    pub delimiter: Expression,
}

/// What happens to a run of whitespace in static text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceOperator {
    Preserve,
    Remove,
    /// Any run becomes a single space.
    Normalize,
    /// A run with a line break becomes `\n`, any other run a single space.
    Collapse,
}

impl SpaceOperator {
    /// `spaces` is whitespace only.
    pub fn apply<'s>(self, spaces: &'s str) -> &'s str {
        match self {
            Self::Preserve => spaces,
            _ if spaces.is_empty() => "",
            Self::Remove => "",
            Self::Normalize => " ",
            Self::Collapse if spaces.contains(['\n', '\u{c}']) => "\n",
            Self::Collapse => " ",
        }
    }
}

/// Operators for whitespace inside text (`interior`) and at its ends
/// (`exterior`). `None` inherits from the enclosing rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpaceOperators {
    pub interior: Option<SpaceOperator>,
    pub exterior: Option<SpaceOperator>,
}

impl SpaceOperators {
    pub const fn new(interior: SpaceOperator, exterior: SpaceOperator) -> Self {
        Self {
            interior: Some(interior),
            exterior: Some(exterior),
        }
    }

    pub fn inherit_from(self, parent: SpaceOperators) -> Self {
        Self {
            interior: self.interior.or(parent.interior),
            exterior: self.exterior.or(parent.exterior),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocType {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

impl DocType {
    pub fn to_markup(&self) -> String {
        match (&self.public_id, &self.system_id) {
            (Some(public_id), Some(system_id)) => {
                format!("<!DOCTYPE {} PUBLIC \"{public_id}\" \"{system_id}\">", self.name)
            }
            (Some(public_id), None) => format!("<!DOCTYPE {} PUBLIC \"{public_id}\">", self.name),
            (None, Some(system_id)) => format!("<!DOCTYPE {} SYSTEM \"{system_id}\">", self.name),
            (None, None) => format!("<!DOCTYPE {}>", self.name),
        }
    }
}

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputElement {
    pub local_name: String,
    /// Content model of the element body when it differs from the element
    /// itself, e.g. `<script>` holds JavaScript.
    pub inner_schema: Option<Schema>,
    pub doc_type: Option<DocType>,
    pub attributes: Vec<Attribute>,
    pub attr_bundles: Vec<String>,
    pub placeholder: Option<String>,
    pub part: ElementPart,
    pub content: Expression,
}

/// Markup an element writes. A message splits an element marked as a
/// placeholder into its tags so the text between them stays translatable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ElementPart {
    #[default]
    Whole,
    /// The doctype and open tag with its attributes.
    OpenTag,
    CloseTag,
}

impl OutputElement {
    pub fn new(local_name: impl Into<String>, content: Expression) -> Self {
        Self {
            local_name: local_name.into(),
            inner_schema: None,
            doc_type: None,
            attributes: Vec::new(),
            attr_bundles: Vec::new(),
            placeholder: None,
            part: ElementPart::Whole,
            content,
        }
    }

    /// Void elements without content are written without a close tag.
    pub fn omits_close_tag(&self) -> bool {
        VOID_ELEMENTS.contains(&self.local_name.as_str()) && self.content.is_empty_string()
    }

    /// The element's open or close tag alone. Tags have no content.
    pub fn tag(&self, part: ElementPart, empty: Expression) -> Self {
        Self {
            placeholder: None,
            part,
            content: empty,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionKind {
    StringConstant {
        value: String,
    },
    BooleanConstant {
        value: bool,
    },
    /// A literal attribute value, untyped until a parameter type parses it.
    ObjectConstant {
        value: String,
        ty: Option<Type>,
    },
    /// A value built by the callee's constructor for `param`.
    ConstructedConstant {
        value: String,
        callee: Callable,
        param: String,
    },
    NativeExpression {
        code: LanguageMap,
        ty: Option<NativeType>,
        /// Placeholder name the value takes inside a message.
        placeholder: Option<String>,
    },
    /// Always at least two values. Built only through `Expression::concat`.
    Concatenation {
        values: Vec<Expression>,
    },
    Conditional(Conditional),
    Loop(LoopExpression),
    Call(Call),
    /// Escapes the subexpression into the node's schema.
    Escape {
        subexpression: Expression,
    },
    ConvertibleToContent {
        subexpression: Expression,
    },
    /// Opts the subexpression out of message extraction.
    NoMessage {
        subexpression: Expression,
    },
    Example {
        subexpression: Expression,
        example: String,
    },
    /// Whitespace rules for the static text of the subexpression. Gone
    /// after space collapsing.
    Collapse {
        subexpression: Expression,
        spaces: SpaceOperators,
    },
    OutputElement(OutputElement),
    PlaceholderStart {
        name: String,
        example: Option<String>,
    },
    PlaceholderEnd,
    Placeholder {
        name: String,
        example: String,
        content: Expression,
    },
    UnextractedMessage {
        meaning: Option<String>,
        comment: Option<String>,
        hidden: bool,
        content: Expression,
    },
    ExtractedMessage {
        message: Message,
        parameters: Vec<Expression>,
    },
    /// Attributes passed to a bundle parameter. `include_attrs` restricts
    /// which attributes of `forwarded` caller bundles are taken; empty means
    /// all of them.
    AttrBundleParam {
        include_attrs: Vec<String>,
        attributes: IndexMap<String, Attribute>,
        forwarded: Vec<String>,
    },
    /// Binds `name` to `value` while producing `content`.
    Abbr {
        name: String,
        ty: Type,
        value: Expression,
        content: Expression,
    },
    Exception {
        message: String,
    },
}

impl ExpressionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StringConstant { .. } => "StringConstant",
            Self::BooleanConstant { .. } => "BooleanConstant",
            Self::ObjectConstant { .. } => "ObjectConstant",
            Self::ConstructedConstant { .. } => "ConstructedConstant",
            Self::NativeExpression { .. } => "NativeExpression",
            Self::Concatenation { .. } => "Concatenation",
            Self::Conditional(_) => "Conditional",
            Self::Loop(_) => "LoopExpression",
            Self::Call(call) => match call {
                Call::Unbound(_) => "UnboundCall",
                Call::Bound(_) => "BoundCall",
                Call::Validated(_) => "ValidatedCall",
            },
            Self::Escape { .. } => "EscapeExpression",
            Self::ConvertibleToContent { .. } => "ConvertibleToContent",
            Self::NoMessage { .. } => "NoMessage",
            Self::Example { .. } => "ExampleExpression",
            Self::Collapse { .. } => "CollapseExpression",
            Self::OutputElement(_) => "OutputElement",
            Self::PlaceholderStart { .. } => "PlaceholderStart",
            Self::PlaceholderEnd => "PlaceholderEnd",
            Self::Placeholder { .. } => "PlaceholderNode",
            Self::UnextractedMessage { .. } => "UnextractedMessage",
            Self::ExtractedMessage { .. } => "ExtractedMessage",
            Self::AttrBundleParam { .. } => "AttrBundleParam",
            Self::Abbr { .. } => "AbbrExpression",
            Self::Exception { .. } => "ExceptionExpression",
        }
    }

    /// Schema implied by the variant, if it is not stored on the node.
    fn derived_schema(&self) -> Option<SchemaTag> {
        match self {
            Self::BooleanConstant { .. }
            | Self::ObjectConstant { .. }
            | Self::ConstructedConstant { .. }
            | Self::NativeExpression { .. } => Some(SchemaTag::Opaque),
            Self::Loop(loop_expression) => Some(loop_expression.subexpression.schema.clone()),
            Self::Call(call) => Some(call.schema_tag()),
            Self::ConvertibleToContent { subexpression }
            | Self::NoMessage { subexpression }
            | Self::Example { subexpression, .. }
            | Self::Collapse { subexpression, .. } => Some(subexpression.schema.clone()),
            Self::Placeholder { content, .. } | Self::Abbr { content, .. } => {
                Some(content.schema.clone())
            }
            Self::StringConstant { .. }
            | Self::Concatenation { .. }
            | Self::Conditional(_)
            | Self::Escape { .. }
            | Self::OutputElement(_)
            | Self::PlaceholderStart { .. }
            | Self::PlaceholderEnd
            | Self::UnextractedMessage { .. }
            | Self::ExtractedMessage { .. }
            | Self::AttrBundleParam { .. }
            | Self::Exception { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionNode {
    pub node: NodeInfo,
    pub schema: SchemaTag,
    pub kind: ExpressionKind,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Expression(Arc<ExpressionNode>);

impl Deref for Expression {
    type Target = ExpressionNode;

    fn deref(&self) -> &ExpressionNode {
        &self.0
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Expression {
    fn from_parts(node: NodeInfo, schema: SchemaTag, kind: ExpressionKind) -> Self {
        let schema = kind.derived_schema().unwrap_or(schema);
        Expression(Arc::new(ExpressionNode { node, schema, kind }))
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(this: &Expression, other: &Expression) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    pub fn position(&self) -> &SourcePosition {
        &self.node.position
    }

    pub fn display_name(&self) -> &str {
        &self.node.display_name
    }

    pub fn known_schema(&self) -> Option<&Schema> {
        self.schema.known()
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn string(node: NodeInfo, schema: SchemaTag, value: impl Into<String>) -> Self {
        Self::from_parts(
            node,
            schema,
            ExpressionKind::StringConstant {
                value: value.into(),
            },
        )
    }

    pub fn boolean(node: NodeInfo, value: bool) -> Self {
        Self::from_parts(node, SchemaTag::Opaque, ExpressionKind::BooleanConstant { value })
    }

    pub fn object(node: NodeInfo, value: impl Into<String>) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Opaque,
            ExpressionKind::ObjectConstant {
                value: value.into(),
                ty: None,
            },
        )
    }

    pub fn constructed(node: NodeInfo, value: impl Into<String>, callee: Callable, param: impl Into<String>) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Opaque,
            ExpressionKind::ConstructedConstant {
                value: value.into(),
                callee,
                param: param.into(),
            },
        )
    }

    pub fn native(node: NodeInfo, code: LanguageMap, ty: Option<NativeType>) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Opaque,
            ExpressionKind::NativeExpression {
                code,
                ty,
                placeholder: None,
            },
        )
    }

    /// Names the placeholder a native expression or element becomes inside
    /// a message. Other nodes are returned as is.
    pub fn with_placeholder_name(&self, name: Option<String>) -> Self {
        match &self.kind {
            ExpressionKind::NativeExpression { code, ty, .. } => {
                self.rebuild(ExpressionKind::NativeExpression {
                    code: code.clone(),
                    ty: ty.clone(),
                    placeholder: name,
                })
            }
            ExpressionKind::OutputElement(element) => {
                self.rebuild(ExpressionKind::OutputElement(OutputElement {
                    placeholder: name,
                    ..element.clone()
                }))
            }
            _ => self.clone(),
        }
    }

    /// Smart constructor for concatenations.
    ///
    /// Nested concatenations are flattened and adjacent string constants
    /// merged (the merged constant keeps the first one's position). No
    /// values give an empty string at `node`, one value is returned as is.
    pub fn concat(node: NodeInfo, schema: SchemaTag, values: Vec<Expression>) -> Self {
        let mut simplified: Vec<Expression> = Vec::with_capacity(values.len());
        let mut pending: Option<Expression> = None;
        flatten_into(values, &mut simplified, &mut pending);
        simplified.extend(pending);
        match simplified.len() {
            0 => Expression::string(node, schema, ""),
            1 => simplified.remove(0),
            _ => Self::from_parts(node, schema, ExpressionKind::Concatenation { values: simplified }),
        }
    }

    pub fn conditional(
        node: NodeInfo,
        schema: SchemaTag,
        clauses: Vec<Clause>,
        else_expression: Expression,
    ) -> Result<Self, ConstructionError> {
        let conditional = Conditional::new(&schema, clauses, else_expression)?;
        Ok(Self::from_parts(node, schema, ExpressionKind::Conditional(conditional)))
    }

    pub fn loop_expression(node: NodeInfo, loop_expression: LoopExpression) -> Self {
        Self::from_parts(node, SchemaTag::Untyped, ExpressionKind::Loop(loop_expression))
    }

    pub fn call(node: NodeInfo, call: Call) -> Self {
        Self::from_parts(node, SchemaTag::Untyped, ExpressionKind::Call(call))
    }

    pub fn escape(node: NodeInfo, schema: Schema, subexpression: Expression) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Known(schema),
            ExpressionKind::Escape { subexpression },
        )
    }

    pub fn convertible_to_content(node: NodeInfo, subexpression: Expression) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Untyped,
            ExpressionKind::ConvertibleToContent { subexpression },
        )
    }

    pub fn no_message(node: NodeInfo, subexpression: Expression) -> Self {
        Self::from_parts(node, SchemaTag::Untyped, ExpressionKind::NoMessage { subexpression })
    }

    pub fn example(node: NodeInfo, subexpression: Expression, example: impl Into<String>) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Untyped,
            ExpressionKind::Example {
                subexpression,
                example: example.into(),
            },
        )
    }

    /// Nested collapse nodes merge, the inner operators winning.
    pub fn collapse(node: NodeInfo, subexpression: Expression, spaces: SpaceOperators) -> Self {
        if let ExpressionKind::Collapse {
            subexpression: inner,
            spaces: inner_spaces,
        } = &subexpression.kind
        {
            return Self::collapse(node, inner.clone(), inner_spaces.inherit_from(spaces));
        }
        Self::from_parts(
            node,
            SchemaTag::Untyped,
            ExpressionKind::Collapse {
                subexpression,
                spaces,
            },
        )
    }

    pub fn output_element(node: NodeInfo, schema: SchemaTag, element: OutputElement) -> Self {
        Self::from_parts(node, schema, ExpressionKind::OutputElement(element))
    }

    pub fn placeholder_start(node: NodeInfo, name: impl Into<String>, example: Option<String>) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Untyped,
            ExpressionKind::PlaceholderStart {
                name: name.into(),
                example,
            },
        )
    }

    pub fn placeholder_end(node: NodeInfo) -> Self {
        Self::from_parts(node, SchemaTag::Untyped, ExpressionKind::PlaceholderEnd)
    }

    pub fn placeholder(
        node: NodeInfo,
        name: impl Into<String>,
        example: impl Into<String>,
        content: Expression,
    ) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Untyped,
            ExpressionKind::Placeholder {
                name: name.into(),
                example: example.into(),
                content,
            },
        )
    }

    pub fn unextracted_message(
        node: NodeInfo,
        schema: SchemaTag,
        meaning: Option<String>,
        comment: Option<String>,
        hidden: bool,
        content: Expression,
    ) -> Self {
        Self::from_parts(
            node,
            schema,
            ExpressionKind::UnextractedMessage {
                meaning,
                comment,
                hidden,
                content,
            },
        )
    }

    pub fn extracted_message(
        node: NodeInfo,
        schema: SchemaTag,
        message: Message,
        parameters: Vec<Expression>,
    ) -> Self {
        Self::from_parts(
            node,
            schema,
            ExpressionKind::ExtractedMessage {
                message,
                parameters,
            },
        )
    }

    pub fn attr_bundle(
        node: NodeInfo,
        schema: Schema,
        include_attrs: Vec<String>,
        attributes: IndexMap<String, Attribute>,
        forwarded: Vec<String>,
    ) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Known(schema),
            ExpressionKind::AttrBundleParam {
                include_attrs,
                attributes,
                forwarded,
            },
        )
    }

    pub fn abbr(
        node: NodeInfo,
        name: impl Into<String>,
        ty: Type,
        value: Expression,
        content: Expression,
    ) -> Self {
        Self::from_parts(
            node,
            SchemaTag::Untyped,
            ExpressionKind::Abbr {
                name: name.into(),
                ty,
                value,
                content,
            },
        )
    }

    pub fn exception(node: NodeInfo, schema: SchemaTag, message: impl Into<String>) -> Self {
        Self::from_parts(
            node,
            schema,
            ExpressionKind::Exception {
                message: message.into(),
            },
        )
    }

    /// New node with this node's info and stored schema but another kind.
    /// Derived schemas are recomputed from `kind`.
    ///
    /// Concatenations must go through `concat` instead.
    pub fn rebuild(&self, kind: ExpressionKind) -> Self {
        Self::from_parts(self.node.clone(), self.schema.clone(), kind)
    }

    /// Same node with another stored schema. Returns `self` when unchanged.
    pub fn with_schema(&self, schema: SchemaTag) -> Self {
        if self.schema == schema || self.kind.derived_schema().is_some() {
            return self.clone();
        }
        Expression(Arc::new(ExpressionNode {
            node: self.node.clone(),
            schema,
            kind: self.kind.clone(),
        }))
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::StringConstant { value } => Some(value),
            _ => None,
        }
    }

    pub fn object_value(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::ObjectConstant { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_empty_string(&self) -> bool {
        self.string_value().is_some_and(str::is_empty)
    }

    /// Typed copy of an object constant. Other nodes are returned unchanged.
    pub fn with_object_type(&self, ty: Type) -> Self {
        match &self.kind {
            ExpressionKind::ObjectConstant { value, .. } => self.rebuild(ExpressionKind::ObjectConstant {
                value: value.clone(),
                ty: Some(ty),
            }),
            _ => self.clone(),
        }
    }
}

fn flatten_into(
    values: Vec<Expression>,
    simplified: &mut Vec<Expression>,
    pending: &mut Option<Expression>,
) {
    for value in values {
        match &value.kind {
            ExpressionKind::Concatenation { values: nested } => {
                flatten_into(nested.clone(), simplified, pending);
            }
            ExpressionKind::StringConstant { value: text } => {
                let merged = match pending.take() {
                    Some(previous) => {
                        let mut merged_text = previous.string_value().unwrap_or_default().to_string();
                        merged_text.push_str(text);
                        Expression::string(previous.node.clone(), previous.schema.clone(), merged_text)
                    }
                    None => value.clone(),
                };
                *pending = Some(merged);
            }
            _ => {
                simplified.extend(pending.take());
                simplified.push(value);
            }
        }
    }
}
