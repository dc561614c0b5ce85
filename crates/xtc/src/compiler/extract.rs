//! Turns message content into a translatable pattern plus the dynamic
//! values its `%n` parameters stand for.

use super::TemplatePass;
use crate::alert::{AlertKind, AlertSink};
use crate::ast::{Expression, ExpressionKind};
use crate::message::{MAX_PARAMETERS, Message, MessagePlaceholder, escape_text};
use crate::visit::{Rewriter, rewrite_children};

pub struct MessageExtractor<'a> {
    alerts: &'a mut dyn AlertSink,
    messages: Vec<Message>,
    in_no_message: bool,
}

/// Pattern, parameters and placeholders of the message being extracted.
struct PatternBuilder<'m> {
    message: &'m Expression,
    pattern: String,
    parameters: Vec<Expression>,
    placeholders: Vec<MessagePlaceholder>,
}

impl<'a> MessageExtractor<'a> {
    pub fn new(alerts: &'a mut dyn AlertSink) -> Self {
        Self {
            alerts,
            messages: Vec::new(),
            in_no_message: false,
        }
    }

    /// Messages in extraction order.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    fn extract(
        &mut self,
        expr: &Expression,
        meaning: &Option<String>,
        comment: &Option<String>,
        hidden: bool,
        content: &Expression,
    ) -> Expression {
        if content.is_empty_string() {
            return content.clone();
        }
        let mut builder = PatternBuilder {
            message: expr,
            pattern: String::new(),
            parameters: Vec::new(),
            placeholders: Vec::new(),
        };
        self.append(&mut builder, content, false);

        let message = Message::new(meaning.clone(), comment.clone(), hidden, builder.pattern)
            .with_placeholders(builder.placeholders);
        log::trace!("extracted message {} at {}", message.id, expr.position());
        self.messages.push(message.clone());
        Expression::extracted_message(expr.node.clone(), expr.schema.clone(), message, builder.parameters)
    }

    fn append(&mut self, builder: &mut PatternBuilder<'_>, expr: &Expression, in_placeholder: bool) {
        match &expr.kind {
            ExpressionKind::StringConstant { value } => builder.pattern.push_str(&escape_text(value)),
            ExpressionKind::Concatenation { values } => {
                for value in values {
                    self.append(builder, value, in_placeholder);
                }
            }
            ExpressionKind::Placeholder {
                name,
                example,
                content,
            } => {
                let start = builder.pattern.len();
                self.append(builder, content, true);
                let presentation = builder.pattern[start..].to_string();
                builder
                    .placeholders
                    .push(MessagePlaceholder::new(name, example.clone(), presentation));
            }
            ExpressionKind::Example { subexpression, .. } => {
                self.append(builder, subexpression, in_placeholder)
            }
            ExpressionKind::UnextractedMessage { .. }
            | ExpressionKind::ExtractedMessage { .. }
            | ExpressionKind::NoMessage { .. } => self.alerts.alert(
                expr.position(),
                AlertKind::BadNodePlacement {
                    node: expr.kind_name().to_string(),
                    parent: Some(builder.message.kind_name().to_string()),
                },
            ),
            _ if in_placeholder => self.parameter(builder, expr),
            _ => self.alerts.alert(
                expr.position(),
                AlertKind::DynamicValueOutsidePlaceholder {
                    node: expr.kind_name().to_string(),
                },
            ),
        }
    }

    /// Equal values share one parameter.
    fn parameter(&mut self, builder: &mut PatternBuilder<'_>, expr: &Expression) {
        let value = self.rewrite(expr);
        let index = match builder.parameters.iter().position(|existing| *existing == value) {
            Some(index) => index,
            None if builder.parameters.len() == MAX_PARAMETERS => {
                self.alerts
                    .alert(expr.position(), AlertKind::TooManyDynamicPlaceholders);
                return;
            }
            None => {
                builder.parameters.push(value);
                builder.parameters.len() - 1
            }
        };
        builder.pattern.push('%');
        builder.pattern.push_str(&(index + 1).to_string());
    }

    /// A message marker outside any message, or inside a `nomsg`.
    fn misplaced(&mut self, expr: &Expression) {
        let parent = self.in_no_message.then(|| "NoMessage".to_string());
        self.alerts.alert(
            expr.position(),
            AlertKind::BadNodePlacement {
                node: expr.kind_name().to_string(),
                parent,
            },
        );
    }
}

impl Rewriter for MessageExtractor<'_> {
    fn rewrite_node(&mut self, expr: &Expression) -> Expression {
        match &expr.kind {
            ExpressionKind::UnextractedMessage { content, .. } if self.in_no_message => {
                self.misplaced(expr);
                self.rewrite(content)
            }
            ExpressionKind::UnextractedMessage {
                meaning,
                comment,
                hidden,
                content,
            } => self.extract(expr, meaning, comment, *hidden, content),
            ExpressionKind::NoMessage { subexpression } => {
                if self.in_no_message {
                    self.misplaced(expr);
                }
                let outer = std::mem::replace(&mut self.in_no_message, true);
                let result = self.rewrite(subexpression);
                self.in_no_message = outer;
                result
            }
            ExpressionKind::Placeholder { content, .. } => {
                self.misplaced(expr);
                self.rewrite(content)
            }
            _ => rewrite_children(self, expr),
        }
    }
}

impl TemplatePass for MessageExtractor<'_> {}
