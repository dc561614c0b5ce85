//! Traversal of expression trees.
//!
//! Two shapes are provided:
//!
//! - [`Visitor`]: a read-only query. Implementors match the variants they
//!   care about and send everything else to `default_visit`.
//! - [`Rewriter`]: a tree transform. The default rewrite of every variant
//!   recurses into children and rebuilds the parent only when a child
//!   changed, so a pass overrides only the variants it transforms and gets
//!   structural sharing for the rest. `post_process` sees every result.
//!
//! [`children`] and [`rewrite_children`] match every variant without a
//! wildcard arm. A new variant does not compile until both handle it.

use crate::ast::{
    Attribute, BoundCall, Call, Clause, Conditional, Expression, ExpressionKind, LoopExpression,
    OutputElement, UnboundCall, ValidatedCall,
};
use crate::schema::SchemaTag;
use indexmap::IndexMap;
use smallvec::SmallVec;

/// Read-only query over expressions.
pub trait Visitor {
    type Output;

    fn default_visit(&mut self, expr: &Expression) -> Self::Output;

    fn visit(&mut self, expr: &Expression) -> Self::Output {
        self.default_visit(expr)
    }
}

pub type Children<'a> = SmallVec<[&'a Expression; 4]>;

fn push_attribute<'a>(children: &mut Children<'a>, attribute: &'a Attribute) {
    children.push(&attribute.value);
    children.extend(attribute.condition.as_ref());
}

/// Direct subexpressions of `expr`, attribute values and conditions included.
pub fn children(expr: &Expression) -> Children<'_> {
    let mut children = Children::new();
    match &expr.kind {
        ExpressionKind::StringConstant { .. }
        | ExpressionKind::BooleanConstant { .. }
        | ExpressionKind::ObjectConstant { .. }
        | ExpressionKind::ConstructedConstant { .. }
        | ExpressionKind::NativeExpression { .. }
        | ExpressionKind::PlaceholderStart { .. }
        | ExpressionKind::PlaceholderEnd
        | ExpressionKind::Exception { .. } => {}
        ExpressionKind::Concatenation { values } => children.extend(values.iter()),
        ExpressionKind::Conditional(conditional) => {
            for clause in &conditional.clauses {
                children.push(&clause.predicate);
                children.push(&clause.expression);
            }
            children.push(&conditional.else_expression);
        }
        ExpressionKind::Loop(loop_expression) => {
            children.extend(loop_expression.iterable.as_ref());
            children.extend(loop_expression.iterator.as_ref());
            children.push(&loop_expression.subexpression);
            children.push(&loop_expression.delimiter);
        }
        ExpressionKind::Call(call) => {
            for attribute in call.attributes().values() {
                push_attribute(&mut children, attribute);
            }
            if let Call::Unbound(unbound) = call {
                children.push(&unbound.content);
            }
        }
        ExpressionKind::Escape { subexpression }
        | ExpressionKind::ConvertibleToContent { subexpression }
        | ExpressionKind::NoMessage { subexpression }
        | ExpressionKind::Example { subexpression, .. }
        | ExpressionKind::Collapse { subexpression, .. } => children.push(subexpression),
        ExpressionKind::OutputElement(element) => {
            for attribute in &element.attributes {
                push_attribute(&mut children, attribute);
            }
            children.push(&element.content);
        }
        ExpressionKind::Placeholder { content, .. }
        | ExpressionKind::UnextractedMessage { content, .. } => children.push(content),
        ExpressionKind::ExtractedMessage { parameters, .. } => children.extend(parameters.iter()),
        ExpressionKind::AttrBundleParam { attributes, .. } => {
            for attribute in attributes.values() {
                push_attribute(&mut children, attribute);
            }
        }
        ExpressionKind::Abbr { value, content, .. } => {
            children.push(value);
            children.push(content);
        }
    }
    children
}

/// Pre-order walk. `f` returns whether to descend into the node's children.
pub fn walk(expr: &Expression, f: &mut impl FnMut(&Expression) -> bool) {
    if f(expr) {
        for child in children(expr) {
            walk(child, f);
        }
    }
}

/// Tree transform with structural sharing.
pub trait Rewriter {
    fn rewrite(&mut self, expr: &Expression) -> Expression {
        let result = self.rewrite_node(expr);
        self.post_process(result)
    }

    /// Override to transform specific variants. Call `rewrite_children` for
    /// the rest.
    fn rewrite_node(&mut self, expr: &Expression) -> Expression {
        rewrite_children(self, expr)
    }

    /// Rewrites a slot holding an output-language value rather than
    /// content: predicates, iterables and iterators, abbreviation values,
    /// attribute conditions.
    fn rewrite_value(&mut self, expr: &Expression) -> Expression {
        self.rewrite(expr)
    }

    fn rewrite_attribute(&mut self, attribute: &Attribute) -> Attribute {
        let value = self.rewrite(&attribute.value);
        let condition = attribute
            .condition
            .as_ref()
            .map(|condition| self.rewrite_value(condition));
        attribute.with_value_and_condition(value, condition)
    }

    fn post_process(&mut self, expr: Expression) -> Expression {
        expr
    }
}

fn same(old: &Expression, new: &Expression) -> bool {
    Expression::ptr_eq(old, new)
}

fn same_option(old: &Option<Expression>, new: &Option<Expression>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => same(old, new),
        (None, None) => true,
        _ => false,
    }
}

/// Rewrites every value, or returns `None` when nothing changed.
pub fn rewrite_all<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    values: &[Expression],
) -> Option<Vec<Expression>> {
    let rewritten: Vec<Expression> = values.iter().map(|value| rewriter.rewrite(value)).collect();
    let changed = values
        .iter()
        .zip(&rewritten)
        .any(|(old, new)| !same(old, new));
    changed.then_some(rewritten)
}

/// Rewrites attributes, or returns `None` when nothing changed.
pub fn rewrite_attribute_map<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    attributes: &IndexMap<String, Attribute>,
) -> Option<IndexMap<String, Attribute>> {
    let mut changed = false;
    let rewritten = attributes
        .iter()
        .map(|(name, attribute)| {
            let new_attribute = rewriter.rewrite_attribute(attribute);
            changed |= new_attribute != *attribute;
            (name.clone(), new_attribute)
        })
        .collect();
    changed.then_some(rewritten)
}

fn rewrite_attribute_list<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    attributes: &[Attribute],
) -> Option<Vec<Attribute>> {
    let rewritten: Vec<Attribute> = attributes
        .iter()
        .map(|attribute| rewriter.rewrite_attribute(attribute))
        .collect();
    (rewritten.as_slice() != attributes).then_some(rewritten)
}

/// Default rewrite: rewrite each child, rebuild `expr` only if one changed.
pub fn rewrite_children<R: Rewriter + ?Sized>(rewriter: &mut R, expr: &Expression) -> Expression {
    match &expr.kind {
        ExpressionKind::StringConstant { .. }
        | ExpressionKind::BooleanConstant { .. }
        | ExpressionKind::ObjectConstant { .. }
        | ExpressionKind::ConstructedConstant { .. }
        | ExpressionKind::NativeExpression { .. }
        | ExpressionKind::PlaceholderStart { .. }
        | ExpressionKind::PlaceholderEnd
        | ExpressionKind::Exception { .. } => expr.clone(),
        ExpressionKind::Concatenation { values } => match rewrite_all(rewriter, values) {
            Some(values) => Expression::concat(expr.node.clone(), expr.schema.clone(), values),
            None => expr.clone(),
        },
        ExpressionKind::Conditional(conditional) => rewrite_conditional(rewriter, expr, conditional),
        ExpressionKind::Loop(loop_expression) => {
            let iterable = loop_expression
                .iterable
                .as_ref()
                .map(|iterable| rewriter.rewrite_value(iterable));
            let iterator = loop_expression
                .iterator
                .as_ref()
                .map(|iterator| rewriter.rewrite_value(iterator));
            let subexpression = rewriter.rewrite(&loop_expression.subexpression);
            let delimiter = rewriter.rewrite(&loop_expression.delimiter);
            if same_option(&loop_expression.iterable, &iterable)
                && same_option(&loop_expression.iterator, &iterator)
                && same(&loop_expression.subexpression, &subexpression)
                && same(&loop_expression.delimiter, &delimiter)
            {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::Loop(LoopExpression {
                var: loop_expression.var.clone(),
                ty: loop_expression.ty.clone(),
                key: loop_expression.key.clone(),
                iterable,
                iterator,
                subexpression,
                delimiter,
            }))
        }
        ExpressionKind::Call(call) => rewrite_call(rewriter, expr, call),
        ExpressionKind::Escape { subexpression } => {
            let new = rewriter.rewrite(subexpression);
            if same(subexpression, &new) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::Escape { subexpression: new })
        }
        ExpressionKind::ConvertibleToContent { subexpression } => {
            let new = rewriter.rewrite(subexpression);
            if same(subexpression, &new) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::ConvertibleToContent { subexpression: new })
        }
        ExpressionKind::NoMessage { subexpression } => {
            let new = rewriter.rewrite(subexpression);
            if same(subexpression, &new) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::NoMessage { subexpression: new })
        }
        ExpressionKind::Example {
            subexpression,
            example,
        } => {
            let new = rewriter.rewrite(subexpression);
            if same(subexpression, &new) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::Example {
                subexpression: new,
                example: example.clone(),
            })
        }
        ExpressionKind::Collapse {
            subexpression,
            spaces,
        } => {
            let new = rewriter.rewrite(subexpression);
            if same(subexpression, &new) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::Collapse {
                subexpression: new,
                spaces: *spaces,
            })
        }
        ExpressionKind::OutputElement(element) => {
            let attributes = rewrite_attribute_list(rewriter, &element.attributes);
            let content = rewriter.rewrite(&element.content);
            if attributes.is_none() && same(&element.content, &content) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::OutputElement(OutputElement {
                attributes: attributes.unwrap_or_else(|| element.attributes.clone()),
                content,
                ..element.clone()
            }))
        }
        ExpressionKind::Placeholder {
            name,
            example,
            content,
        } => {
            let new = rewriter.rewrite(content);
            if same(content, &new) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::Placeholder {
                name: name.clone(),
                example: example.clone(),
                content: new,
            })
        }
        ExpressionKind::UnextractedMessage {
            meaning,
            comment,
            hidden,
            content,
        } => {
            let new = rewriter.rewrite(content);
            if same(content, &new) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::UnextractedMessage {
                meaning: meaning.clone(),
                comment: comment.clone(),
                hidden: *hidden,
                content: new,
            })
        }
        ExpressionKind::ExtractedMessage {
            message,
            parameters,
        } => match rewrite_all(rewriter, parameters) {
            Some(parameters) => expr.rebuild(ExpressionKind::ExtractedMessage {
                message: message.clone(),
                parameters,
            }),
            None => expr.clone(),
        },
        ExpressionKind::AttrBundleParam {
            include_attrs,
            attributes,
            forwarded,
        } => match rewrite_attribute_map(rewriter, attributes) {
            Some(attributes) => expr.rebuild(ExpressionKind::AttrBundleParam {
                include_attrs: include_attrs.clone(),
                attributes,
                forwarded: forwarded.clone(),
            }),
            None => expr.clone(),
        },
        ExpressionKind::Abbr {
            name,
            ty,
            value,
            content,
        } => {
            let new_value = rewriter.rewrite_value(value);
            let new_content = rewriter.rewrite(content);
            if same(value, &new_value) && same(content, &new_content) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::Abbr {
                name: name.clone(),
                ty: ty.clone(),
                value: new_value,
                content: new_content,
            })
        }
    }
}

fn rewrite_conditional<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    expr: &Expression,
    conditional: &Conditional,
) -> Expression {
    let mut changed = false;
    let clauses: Vec<Clause> = conditional
        .clauses
        .iter()
        .map(|clause| {
            let predicate = rewriter.rewrite_value(&clause.predicate);
            let expression = rewriter.rewrite(&clause.expression);
            changed |= !same(&clause.predicate, &predicate) || !same(&clause.expression, &expression);
            Clause::new(clause.node.clone(), predicate, expression)
        })
        .collect();
    let else_expression = rewriter.rewrite(&conditional.else_expression);
    changed |= !same(&conditional.else_expression, &else_expression);
    if !changed {
        return expr.clone();
    }
    // a rewritten branch may leave the conditional's schema, e.g. a call
    // bound to a callee of another content type; the escaper reports it
    let keeps_schema = expr.known_schema().is_none_or(|schema| {
        clauses
            .iter()
            .map(|clause| &clause.expression)
            .chain(std::iter::once(&else_expression))
            .all(|branch| branch.schema.allowed_by(schema))
    });
    let rebuilt = expr.rebuild(ExpressionKind::Conditional(Conditional {
        clauses,
        else_expression,
    }));
    if keeps_schema {
        rebuilt
    } else {
        log::debug!("conditional at {} loses its schema {}", expr.position(), expr.schema);
        rebuilt.with_schema(SchemaTag::Untyped)
    }
}

fn rewrite_call<R: Rewriter + ?Sized>(rewriter: &mut R, expr: &Expression, call: &Call) -> Expression {
    let attributes = rewrite_attribute_map(rewriter, call.attributes());
    match call {
        Call::Unbound(unbound) => {
            let content = rewriter.rewrite(&unbound.content);
            if attributes.is_none() && same(&unbound.content, &content) {
                return expr.clone();
            }
            expr.rebuild(ExpressionKind::Call(Call::Unbound(UnboundCall {
                callee: unbound.callee.clone(),
                attributes: attributes.unwrap_or_else(|| unbound.attributes.clone()),
                attr_bundles: unbound.attr_bundles.clone(),
                content,
            })))
        }
        Call::Bound(bound) => match attributes {
            Some(attributes) => expr.rebuild(ExpressionKind::Call(Call::Bound(BoundCall {
                attributes,
                ..bound.clone()
            }))),
            None => expr.clone(),
        },
        Call::Validated(validated) => match attributes {
            Some(attributes) => {
                expr.rebuild(ExpressionKind::Call(Call::Validated(ValidatedCall {
                    callee: validated.callee.clone(),
                    attributes,
                })))
            }
            None => expr.clone(),
        },
    }
}

/// A pass met a node it must never see. This is a bug in pass ordering,
/// not in the template being compiled.
pub fn unexpected_node(pass: &str, expr: &Expression) -> ! {
    panic!(
        "{pass}: unexpected {} at {}",
        expr.kind_name(),
        expr.position()
    )
}
