//! Types every content node with the schema of the place it is written to.
//!
//! Static text is escaped now, dynamic values are wrapped in an escape node
//! for the runtime appender. Content the context schema does not allow is
//! reported and replaced with an empty string.

use super::TemplatePass;
use crate::alert::{AlertKind, AlertSink};
use crate::ast::{
    Attribute, Call, Clause, Expression, ExpressionKind, OutputElement, ValidatedCall,
};
use crate::callable::{Parameter, Template};
use crate::schema::{Schema, SchemaRegistry, SchemaTag};
use crate::visit::{Rewriter, rewrite_all, rewrite_children, unexpected_node};
use indexmap::IndexMap;

pub struct Escaper<'a> {
    /// Schema of the content being rewritten.
    schema: Schema,
    schemas: &'a dyn SchemaRegistry,
    alerts: &'a mut dyn AlertSink,
}

impl<'a> Escaper<'a> {
    pub fn new(schema: Schema, schemas: &'a dyn SchemaRegistry, alerts: &'a mut dyn AlertSink) -> Self {
        Self {
            schema,
            schemas,
            alerts,
        }
    }

    fn escape_in(&mut self, schema: Schema, expr: &Expression) -> Expression {
        let outer = std::mem::replace(&mut self.schema, schema);
        let result = self.rewrite(expr);
        self.schema = outer;
        result
    }

    fn empty(&self, expr: &Expression) -> Expression {
        Expression::string(expr.node.clone(), SchemaTag::Known(self.schema.clone()), "")
    }

    /// `escaped` holds `schema` content. Wraps it if the context differs.
    fn retype(&self, schema: &Schema, escaped: Expression) -> Expression {
        if *schema == self.schema {
            escaped
        } else {
            Expression::escape(escaped.node.clone(), self.schema.clone(), escaped)
        }
    }

    /// Values with their own schema (`onclick` holds JavaScript) are escaped
    /// in it first.
    fn escape_attribute(&mut self, attribute: &Attribute) -> Attribute {
        let value = match &attribute.inner_schema {
            Some(schema) => {
                let escaped = self.escape_in(schema.clone(), &attribute.value);
                self.retype(schema, escaped)
            }
            None => self.rewrite(&attribute.value),
        };
        attribute.with_value(value)
    }

    fn escape_call(&mut self, expr: &Expression, call: &ValidatedCall) -> Expression {
        let mut changed = false;
        let mut attributes = IndexMap::with_capacity(call.attributes.len());
        for (name, attribute) in &call.attributes {
            let schema = call
                .callee
                .parameter_by_primary(name)
                .and_then(|parameter| parameter.ty.content_schema())
                .cloned();
            let escaped = match schema {
                Some(schema) => attribute.with_value(self.escape_in(schema, &attribute.value)),
                None => attribute.clone(),
            };
            changed |= !Expression::ptr_eq(&escaped.value, &attribute.value);
            attributes.insert(name.clone(), escaped);
        }
        if !changed {
            return expr.clone();
        }
        expr.rebuild(ExpressionKind::Call(Call::Validated(ValidatedCall {
            callee: call.callee.clone(),
            attributes,
        })))
    }

    fn escape_bundle(
        &mut self,
        expr: &Expression,
        include_attrs: &[String],
        attributes: &IndexMap<String, Attribute>,
        forwarded: &[String],
    ) -> Expression {
        let mut escaped = IndexMap::with_capacity(attributes.len());
        for (name, attribute) in attributes {
            let attribute = match attribute.value.kind {
                // boolean attributes are written by name only
                ExpressionKind::BooleanConstant { .. } => attribute.clone(),
                _ => self.escape_attribute(attribute),
            };
            escaped.insert(name.clone(), attribute);
        }
        expr.rebuild(ExpressionKind::AttrBundleParam {
            include_attrs: include_attrs.to_vec(),
            attributes: escaped,
            forwarded: forwarded.to_vec(),
        })
    }

    fn escape_element(&mut self, expr: &Expression, element: &OutputElement) -> Expression {
        let inner_schema = element
            .inner_schema
            .clone()
            .unwrap_or_else(|| self.schema.clone());
        let content = self.escape_in(inner_schema, &element.content);
        let attributes = element
            .attributes
            .iter()
            .map(|attribute| self.escape_attribute(attribute))
            .collect();
        let schema = match &expr.schema {
            SchemaTag::Known(schema) => SchemaTag::Known(schema.clone()),
            SchemaTag::Untyped | SchemaTag::Opaque => SchemaTag::Known(self.schema.clone()),
        };
        Expression::output_element(
            expr.node.clone(),
            schema,
            OutputElement {
                attributes,
                content,
                ..element.clone()
            },
        )
    }

    fn escape_message(
        &mut self,
        expr: &Expression,
        meaning: &Option<String>,
        comment: &Option<String>,
        hidden: bool,
        content: &Expression,
    ) -> Expression {
        let message_schema = match self.schemas.message_schema(&self.schema) {
            Some(schema) => schema,
            None => {
                self.alerts.alert(
                    expr.position(),
                    AlertKind::UntranslatableMessage {
                        content_type: self.schema.content_type().to_string(),
                    },
                );
                self.schema.clone()
            }
        };
        let content = self.escape_in(message_schema.clone(), content);
        let message = Expression::unextracted_message(
            expr.node.clone(),
            SchemaTag::Known(message_schema.clone()),
            meaning.clone(),
            comment.clone(),
            hidden,
            content,
        );
        self.retype(&message_schema, message)
    }
}

impl Rewriter for Escaper<'_> {
    fn rewrite_node(&mut self, expr: &Expression) -> Expression {
        let context = self.schema.clone();
        match &expr.kind {
            ExpressionKind::StringConstant { value } => match &expr.schema {
                SchemaTag::Known(_) => expr.clone(),
                SchemaTag::Untyped | SchemaTag::Opaque => Expression::string(
                    expr.node.clone(),
                    SchemaTag::Known(context.clone()),
                    context.escape_static(value),
                ),
            },
            ExpressionKind::BooleanConstant { .. }
            | ExpressionKind::ObjectConstant { .. }
            | ExpressionKind::ConstructedConstant { .. }
            | ExpressionKind::NativeExpression { .. } => {
                Expression::escape(expr.node.clone(), context, expr.clone())
            }
            ExpressionKind::Concatenation { values } => {
                let tag = SchemaTag::Known(context);
                match rewrite_all(self, values) {
                    None if expr.schema == tag => expr.clone(),
                    rewritten => Expression::concat(
                        expr.node.clone(),
                        tag,
                        rewritten.unwrap_or_else(|| values.clone()),
                    ),
                }
            }
            ExpressionKind::Conditional(conditional) => {
                let clauses = conditional
                    .clauses
                    .iter()
                    .map(|clause| {
                        Clause::new(
                            clause.node.clone(),
                            self.rewrite_value(&clause.predicate),
                            self.rewrite(&clause.expression),
                        )
                    })
                    .collect();
                let else_expression = self.rewrite(&conditional.else_expression);
                match Expression::conditional(
                    expr.node.clone(),
                    SchemaTag::Known(context),
                    clauses,
                    else_expression,
                ) {
                    Ok(rebuilt) => rebuilt,
                    Err(error) => {
                        self.alerts.alert(
                            expr.position(),
                            AlertKind::InvalidConstruction {
                                message: error.to_string(),
                            },
                        );
                        self.empty(expr)
                    }
                }
            }
            ExpressionKind::Call(Call::Validated(call)) => self.escape_call(expr, call),
            ExpressionKind::Call(Call::Unbound(_) | Call::Bound(_)) => {
                unexpected_node("escaper", expr)
            }
            ExpressionKind::AttrBundleParam {
                include_attrs,
                attributes,
                forwarded,
            } => self.escape_bundle(expr, include_attrs, attributes, forwarded),
            ExpressionKind::OutputElement(element) => self.escape_element(expr, element),
            ExpressionKind::PlaceholderStart { .. }
            | ExpressionKind::PlaceholderEnd
            | ExpressionKind::Exception { .. } => expr.with_schema(SchemaTag::Known(context)),
            ExpressionKind::Escape { .. } => match expr.known_schema() {
                Some(schema) if *schema != context => {
                    Expression::escape(expr.node.clone(), context, expr.clone())
                }
                _ => expr.clone(),
            },
            ExpressionKind::UnextractedMessage {
                meaning,
                comment,
                hidden,
                content,
            } => self.escape_message(expr, meaning, comment, *hidden, content),
            ExpressionKind::ConvertibleToContent { subexpression } => self.rewrite(subexpression),
            ExpressionKind::Loop(_)
            | ExpressionKind::Abbr { .. }
            | ExpressionKind::NoMessage { .. }
            | ExpressionKind::Example { .. } => rewrite_children(self, expr),
            ExpressionKind::ExtractedMessage { .. }
            | ExpressionKind::Placeholder { .. }
            | ExpressionKind::Collapse { .. } => unexpected_node("escaper", expr),
        }
    }

    /// Output-language values are not content.
    fn rewrite_value(&mut self, expr: &Expression) -> Expression {
        expr.clone()
    }

    fn post_process(&mut self, expr: Expression) -> Expression {
        if expr.schema.allowed_by(&self.schema) {
            return expr;
        }
        self.alerts.alert(
            expr.position(),
            AlertKind::TypeError {
                expected: self.schema.to_string(),
                found: expr.schema.to_string(),
            },
        );
        self.empty(&expr)
    }
}

impl TemplatePass for Escaper<'_> {
    fn rewrite_default(&mut self, parameter: &Parameter, value: &Expression) -> Expression {
        match parameter.formal.ty.content_schema() {
            Some(schema) => self.escape_in(schema.clone(), value),
            None => value.clone(),
        }
    }

    fn rewrite_content(&mut self, template: &Template) -> Expression {
        self.escape_in(template.schema.clone(), &template.content)
    }
}
