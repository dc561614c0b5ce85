//! Pairs placeholder start and end markers into placeholder nodes.
//!
//! `{ph name=x}...{/ph}` arrives as sibling markers in a concatenation.
//! Elements and native expressions marked with a placeholder name get their
//! markers inserted first. Every placeholder gets an example for
//! translators.

use super::TemplatePass;
use crate::alert::{AlertKind, AlertSink};
use crate::ast::{ElementPart, Expression, ExpressionKind, NodeInfo, OutputElement};
use crate::schema::SchemaTag;
use crate::visit::{Rewriter, Visitor, rewrite_children};

pub struct PlaceholderPivoter<'a> {
    alerts: &'a mut dyn AlertSink,
    pivoted: usize,
}

/// A start marker waiting for its end.
struct OpenPlaceholder {
    node: NodeInfo,
    name: String,
    example: Option<String>,
    content: Vec<Expression>,
}

impl<'a> PlaceholderPivoter<'a> {
    pub fn new(alerts: &'a mut dyn AlertSink) -> Self {
        Self { alerts, pivoted: 0 }
    }

    pub fn placeholders(&self) -> usize {
        self.pivoted
    }

    fn pivot_concatenation(&mut self, expr: &Expression, values: &[Expression]) -> Expression {
        let mut changed = false;
        let mut expanded = Vec::with_capacity(values.len());
        for value in values {
            changed |= insert_markers(value, &mut expanded);
        }
        self.pivot_values(expr, &expanded, changed)
    }

    /// Pairs the markers among `values` into placeholders. The result
    /// replaces `expr`.
    fn pivot_values(&mut self, expr: &Expression, values: &[Expression], mut changed: bool) -> Expression {
        let mut output = Vec::with_capacity(values.len());
        let mut open: Option<OpenPlaceholder> = None;

        for value in values {
            match &value.kind {
                ExpressionKind::PlaceholderStart { name, example } => {
                    changed = true;
                    if let Some(unclosed) = open.take() {
                        self.missing_end(&unclosed);
                        output.extend(unclosed.content);
                    }
                    open = Some(OpenPlaceholder {
                        node: value.node.clone(),
                        name: name.clone(),
                        example: example.clone(),
                        content: Vec::new(),
                    });
                }
                ExpressionKind::PlaceholderEnd => {
                    changed = true;
                    match open.take() {
                        Some(placeholder) => {
                            let placeholder = self.make_placeholder(&expr.schema, placeholder);
                            output.push(placeholder);
                        }
                        None => self
                            .alerts
                            .alert(value.position(), AlertKind::PlaceholderEndWithoutStart),
                    }
                }
                _ => {
                    let rewritten = self.rewrite(value);
                    changed |= !Expression::ptr_eq(value, &rewritten);
                    match &mut open {
                        Some(placeholder) => placeholder.content.push(rewritten),
                        None => output.push(rewritten),
                    }
                }
            }
        }
        if let Some(unclosed) = open {
            self.missing_end(&unclosed);
            output.extend(unclosed.content);
        }

        if !changed {
            return expr.clone();
        }
        Expression::concat(expr.node.clone(), expr.schema.clone(), output)
    }

    fn missing_end(&mut self, placeholder: &OpenPlaceholder) {
        self.alerts.alert(
            &placeholder.node.position,
            AlertKind::PlaceholderMissingEnd {
                name: placeholder.name.clone(),
            },
        );
    }

    fn make_placeholder(&mut self, schema: &SchemaTag, placeholder: OpenPlaceholder) -> Expression {
        let content = Expression::concat(placeholder.node.clone(), schema.clone(), placeholder.content);
        let example = if content.is_empty_string() {
            self.alerts.alert(
                &placeholder.node.position,
                AlertKind::EmptyPlaceholder {
                    name: placeholder.name.clone(),
                },
            );
            String::new()
        } else {
            match placeholder.example.or_else(|| find_example(&content)) {
                Some(example) => example,
                None => {
                    self.alerts.alert(
                        &placeholder.node.position,
                        AlertKind::PlaceholderRequiresExample {
                            name: placeholder.name.clone(),
                        },
                    );
                    format!("<var>{}</var>", placeholder.name.to_uppercase())
                }
            }
        };
        self.pivoted += 1;
        Expression::placeholder(placeholder.node, placeholder.name, example, content)
    }
}

impl Rewriter for PlaceholderPivoter<'_> {
    fn rewrite_node(&mut self, expr: &Expression) -> Expression {
        let mut expanded = Vec::new();
        if insert_markers(expr, &mut expanded) {
            return self.pivot_values(expr, &expanded, true);
        }
        match &expr.kind {
            ExpressionKind::Concatenation { values } => self.pivot_concatenation(expr, values),
            ExpressionKind::PlaceholderStart { name, .. } => {
                self.alerts.alert(
                    expr.position(),
                    AlertKind::PlaceholderMissingEnd { name: name.clone() },
                );
                Expression::string(expr.node.clone(), expr.schema.clone(), "")
            }
            ExpressionKind::PlaceholderEnd => {
                self.alerts
                    .alert(expr.position(), AlertKind::PlaceholderEndWithoutStart);
                Expression::string(expr.node.clone(), expr.schema.clone(), "")
            }
            _ => rewrite_children(self, expr),
        }
    }
}

impl TemplatePass for PlaceholderPivoter<'_> {}

/// Appends `value` to `output`, spelling out the markers of an element or
/// native expression named as a placeholder. Returns whether markers were
/// inserted.
///
/// A marked element whose content is only whitespace becomes one
/// placeholder. Otherwise its open and close tags become the placeholders
/// `name_start` and `name_end` and the content between them stays in the
/// message.
fn insert_markers(value: &Expression, output: &mut Vec<Expression>) -> bool {
    let start = |name: String| Expression::placeholder_start(value.node.clone(), name, None);
    let end = || Expression::placeholder_end(value.node.clone());

    if let ExpressionKind::OutputElement(element) = &value.kind {
        let Some(name) = &element.placeholder else {
            output.push(value.clone());
            return false;
        };
        if is_whitespace(&element.content) {
            output.extend([start(name.clone()), value.with_placeholder_name(None), end()]);
            return true;
        }
        let tag = |part| {
            let empty = Expression::string(value.node.clone(), element.content.schema.clone(), "");
            Expression::output_element(value.node.clone(), value.schema.clone(), element.tag(part, empty))
        };
        output.extend([start(format!("{name}_start")), tag(ElementPart::OpenTag), end()]);
        match &element.content.kind {
            ExpressionKind::Concatenation { values } => {
                for content in values {
                    insert_markers(content, output);
                }
            }
            _ => {
                insert_markers(&element.content, output);
            }
        }
        output.extend([start(format!("{name}_end")), tag(ElementPart::CloseTag), end()]);
        return true;
    }

    match unmark_native(value) {
        Some((name, unmarked)) => {
            output.extend([start(name), unmarked, end()]);
            true
        }
        None => {
            output.push(value.clone());
            false
        }
    }
}

/// The placeholder name of a native expression, seen through escapes and
/// examples, and the same value without the name.
fn unmark_native(value: &Expression) -> Option<(String, Expression)> {
    match &value.kind {
        ExpressionKind::NativeExpression {
            placeholder: Some(name),
            ..
        } => Some((name.clone(), value.with_placeholder_name(None))),
        ExpressionKind::Escape { subexpression } => {
            let (name, unmarked) = unmark_native(subexpression)?;
            Some((name, value.rebuild(ExpressionKind::Escape { subexpression: unmarked })))
        }
        ExpressionKind::Example {
            subexpression,
            example,
        } => {
            let (name, unmarked) = unmark_native(subexpression)?;
            let kind = ExpressionKind::Example {
                subexpression: unmarked,
                example: example.clone(),
            };
            Some((name, value.rebuild(kind)))
        }
        _ => None,
    }
}

fn is_whitespace(content: &Expression) -> bool {
    content
        .string_value()
        .is_some_and(|text| text.trim().is_empty())
}

fn find_example(content: &Expression) -> Option<String> {
    ExampleFinder.visit(content)
}

/// What a placeholder's content looks like when all of it is known: an
/// explicit example or static text and markup.
struct ExampleFinder;

impl ExampleFinder {
    fn element(&mut self, element: &OutputElement) -> Option<String> {
        let close = format!("</{}>", element.local_name);
        if element.part == ElementPart::CloseTag {
            return Some(close);
        }
        if !element.attr_bundles.is_empty() {
            return None;
        }
        let mut markup = element
            .doc_type
            .as_ref()
            .map(|doc_type| doc_type.to_markup())
            .unwrap_or_default();
        markup.push('<');
        markup.push_str(&element.local_name);
        for attribute in &element.attributes {
            if attribute.condition.is_some() {
                return None;
            }
            let value = self.visit(&attribute.value)?;
            markup.push_str(&format!(" {}=\"{value}\"", attribute.name));
        }
        markup.push('>');
        if element.part == ElementPart::OpenTag || element.omits_close_tag() {
            return Some(markup);
        }
        markup.push_str(&self.visit(&element.content)?);
        markup.push_str(&close);
        Some(markup)
    }
}

impl Visitor for ExampleFinder {
    type Output = Option<String>;

    fn default_visit(&mut self, _expr: &Expression) -> Option<String> {
        None
    }

    fn visit(&mut self, expr: &Expression) -> Option<String> {
        match &expr.kind {
            ExpressionKind::Example { example, .. } => Some(example.clone()),
            ExpressionKind::StringConstant { value } => Some(value.clone()),
            ExpressionKind::Concatenation { values } => values
                .iter()
                .map(|value| self.visit(value))
                .collect::<Option<Vec<_>>>()
                .map(|parts| parts.concat()),
            ExpressionKind::Escape { subexpression }
            | ExpressionKind::ConvertibleToContent { subexpression }
            | ExpressionKind::NoMessage { subexpression } => self.visit(subexpression),
            ExpressionKind::OutputElement(element) => self.element(element),
            _ => self.default_visit(expr),
        }
    }
}
