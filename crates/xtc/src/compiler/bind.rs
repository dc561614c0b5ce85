//! Unbound → Bound: resolves callees and moves call bodies into the
//! callee's content parameter.

use super::TemplatePass;
use crate::alert::{AlertKind, AlertSink};
use crate::ast::{Attribute, BoundCall, Call, Expression, ExpressionKind, UnboundCall};
use crate::callable::{CallableRegistry, FormalParameter, INSTANCE_PARAM_NAME};
use crate::schema::SchemaTag;
use crate::visit::{Rewriter, rewrite_children, unexpected_node};
use indexmap::IndexMap;

pub struct Binder<'a> {
    callables: &'a dyn CallableRegistry,
    alerts: &'a mut dyn AlertSink,
    bound: usize,
}

impl<'a> Binder<'a> {
    pub fn new(callables: &'a dyn CallableRegistry, alerts: &'a mut dyn AlertSink) -> Self {
        Self {
            callables,
            alerts,
            bound: 0,
        }
    }

    pub fn bound_calls(&self) -> usize {
        self.bound
    }

    fn bind_call(&mut self, expr: &Expression, call: &UnboundCall) -> Expression {
        let callee = if call.attributes.contains_key(INSTANCE_PARAM_NAME) {
            self.callables.instance_callable(&call.callee)
        } else {
            self.callables.callable(&call.callee)
        };
        let Some(callee) = callee else {
            self.alerts.alert(
                expr.position(),
                AlertKind::CallableNotFound {
                    callee: call.callee.clone(),
                },
            );
            return Expression::string(expr.node.clone(), SchemaTag::Untyped, "");
        };

        let mut attributes = IndexMap::with_capacity(call.attributes.len() + 1);
        for (name, attribute) in &call.attributes {
            let attribute = self.rewrite_attribute(attribute);
            let attribute = match callee.parameter(name) {
                Some(parameter) => {
                    let value = prepare_value(parameter, &attribute.value);
                    attribute.with_value(value)
                }
                // reported when validating
                None => attribute,
            };
            attributes.insert(name.clone(), attribute);
        }

        let content = self.rewrite(&call.content);
        if !content.is_empty_string() {
            match callee.content_consuming_parameter() {
                None => self.alerts.alert(
                    content.position(),
                    AlertKind::ContentNotAllowed {
                        callee: callee.name().to_string(),
                    },
                ),
                Some(parameter) if attributes.contains_key(&parameter.primary_name) => {
                    self.alerts.alert(
                        content.position(),
                        AlertKind::DuplicateParameterValue {
                            callee: callee.name().to_string(),
                            name: parameter.primary_name.clone(),
                        },
                    )
                }
                Some(parameter) => {
                    let value = prepare_value(parameter, &content);
                    attributes.insert(
                        parameter.primary_name.clone(),
                        Attribute::new(content.node.clone(), parameter.primary_name.clone(), value),
                    );
                }
            }
        }

        self.bound += 1;
        log::trace!("bound {} at {}", callee.name(), expr.position());
        Expression::call(
            expr.node.clone(),
            Call::Bound(BoundCall {
                callee,
                attributes,
                attr_bundles: call.attr_bundles.clone(),
            }),
        )
    }
}

/// Content conversion only survives on content parameters.
fn prepare_value(parameter: &FormalParameter, value: &Expression) -> Expression {
    match &value.kind {
        ExpressionKind::ConvertibleToContent { subexpression } if !parameter.ty.is_content() => {
            subexpression.clone()
        }
        _ => value.clone(),
    }
}

impl Rewriter for Binder<'_> {
    fn rewrite_node(&mut self, expr: &Expression) -> Expression {
        match &expr.kind {
            ExpressionKind::Call(Call::Unbound(call)) => self.bind_call(expr, call),
            ExpressionKind::Call(Call::Bound(_) | Call::Validated(_)) => {
                unexpected_node("binder", expr)
            }
            _ => rewrite_children(self, expr),
        }
    }
}

impl TemplatePass for Binder<'_> {}
