//! Reports static text users will see untranslated.
//!
//! Runs on the bound tree, before placeholders are paired. Text is checked
//! where it reaches users: markup content outside messages, visible-text
//! attributes of elements and values of markup-typed parameters. A `nomsg`
//! that hides no such text is reported as unnecessary.

use crate::alert::{AlertKind, AlertSink};
use crate::ast::{Call, Expression, ExpressionKind};
use crate::callable::Template;
use crate::schema::ContentFamily;
use crate::types::Type;
use crate::visit::{Visitor, children, unexpected_node};

/// Element attributes whose values are shown to users.
const VISIBLE_TEXT_ATTRIBUTES: [&str; 6] =
    ["abbr", "alt", "label", "placeholder", "summary", "title"];

pub struct I18nChecker<'a> {
    alerts: &'a mut dyn AlertSink,
    /// Static text here is shown to users.
    checked: bool,
    in_message: bool,
    /// Set inside a `nomsg`: whether it hid checked text so far.
    no_message: Option<bool>,
    unextractable: usize,
}

impl<'a> I18nChecker<'a> {
    pub fn new(alerts: &'a mut dyn AlertSink) -> Self {
        Self {
            alerts,
            checked: true,
            in_message: false,
            no_message: None,
            unextractable: 0,
        }
    }

    pub fn unextractable(&self) -> usize {
        self.unextractable
    }

    /// Checks parameter defaults, then the body.
    pub fn check(&mut self, template: &Template) {
        for parameter in &template.parameters {
            if let Some(default) = &parameter.default_value {
                self.checked = checks_text(&parameter.formal.ty);
                self.visit(default);
            }
        }
        self.checked = template.schema.family() == ContentFamily::Markup;
        self.visit(&template.content);
    }

    fn visit_with(&mut self, checked: bool, expr: &Expression) {
        let outer = std::mem::replace(&mut self.checked, checked);
        self.visit(expr);
        self.checked = outer;
    }

    fn string(&mut self, expr: &Expression, value: &str) {
        if !self.checked || is_locale_independent(value) {
            return;
        }
        match &mut self.no_message {
            Some(hidden) => *hidden = true,
            None => {
                self.unextractable += 1;
                self.alerts.alert(
                    expr.position(),
                    AlertKind::UnextractableContent {
                        node: expr.node.display_name.to_string(),
                    },
                );
            }
        }
    }

    fn no_message(&mut self, expr: &Expression, subexpression: &Expression) {
        let outer = self.no_message.replace(false);
        self.visit(subexpression);
        let hid_text = std::mem::replace(&mut self.no_message, outer) == Some(true);
        // inside a message the extractor reports it
        if !hid_text && !self.in_message {
            self.alerts.alert(
                expr.position(),
                AlertKind::UnnecessaryNomsg {
                    node: expr.node.display_name.to_string(),
                },
            );
        }
    }
}

impl Visitor for I18nChecker<'_> {
    type Output = ();

    fn default_visit(&mut self, expr: &Expression) {
        for child in children(expr) {
            self.visit(child);
        }
    }

    fn visit(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::StringConstant { value } => self.string(expr, value),
            ExpressionKind::UnextractedMessage { content, .. } => {
                let outer = std::mem::replace(&mut self.in_message, true);
                self.visit_with(false, content);
                self.in_message = outer;
            }
            ExpressionKind::NoMessage { subexpression } => self.no_message(expr, subexpression),
            // placeholder content is not translated
            ExpressionKind::PlaceholderStart { .. } if self.in_message => self.checked = true,
            ExpressionKind::PlaceholderEnd if self.in_message => self.checked = false,
            ExpressionKind::OutputElement(element) => {
                for attribute in &element.attributes {
                    let visible = VISIBLE_TEXT_ATTRIBUTES.contains(&attribute.name.as_str());
                    self.visit_with(visible, &attribute.value);
                    if let Some(condition) = &attribute.condition {
                        self.visit_with(false, condition);
                    }
                }
                let visible_body = element
                    .inner_schema
                    .as_ref()
                    .is_none_or(|schema| schema.family() == ContentFamily::Markup);
                self.visit_with(self.checked && visible_body, &element.content);
            }
            ExpressionKind::Call(Call::Bound(call)) => {
                for (name, attribute) in &call.attributes {
                    let checked = call
                        .callee
                        .parameter_by_primary(name)
                        .is_none_or(|parameter| checks_text(&parameter.ty));
                    self.visit_with(checked, &attribute.value);
                }
            }
            ExpressionKind::Call(Call::Unbound(_) | Call::Validated(_)) => {
                unexpected_node("i18n check", expr)
            }
            ExpressionKind::Abbr { ty, value, content, .. } => {
                self.visit_with(self.checked && checks_text(ty), value);
                self.visit(content);
            }
            _ => self.default_visit(expr),
        }
    }
}

/// Whether values of a parameter of type `ty` are shown to users.
fn checks_text(ty: &Type) -> bool {
    match ty {
        Type::Content(schema) => schema.family() == ContentFamily::Markup,
        _ => true,
    }
}

/// Text of spaces alone needs no translation.
fn is_locale_independent(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertSet, Severity};
    use crate::ast::OutputElement;
    use crate::callable::Parameter;
    use crate::schema::SchemaTag;
    use crate::testing::{attribute, formal, html, javascript, native, node, string};

    fn check(content: Expression) -> AlertSet {
        let template = Template::new(node("page"), "com.example.Page", html(), vec![], content);
        let mut alerts = AlertSet::new();
        I18nChecker::new(&mut alerts).check(&template);
        alerts
    }

    fn names(alerts: &AlertSet) -> Vec<&'static str> {
        alerts.iter().map(|alert| alert.kind.name()).collect()
    }

    fn concat(values: Vec<Expression>) -> Expression {
        Expression::concat(node("concat"), SchemaTag::Untyped, values)
    }

    fn message(content: Expression) -> Expression {
        Expression::unextracted_message(node("msg"), SchemaTag::Untyped, None, None, false, content)
    }

    #[test]
    fn test_text_outside_messages_is_unextractable() {
        let alerts = check(concat(vec![string("Hello"), native("x"), string(" \u{a0} ")]));
        assert_eq!(names(&alerts), ["unextractable-content"]);
        assert_eq!(alerts.iter().next().map(|alert| alert.severity), Some(Severity::Info));
    }

    #[test]
    fn test_message_text_is_extractable() {
        let alerts = check(message(string("Hello")));
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_placeholder_text_is_checked() {
        let content = concat(vec![
            string("Hello "),
            Expression::placeholder_start(node("ph"), "b", None),
            string("bold"),
            Expression::placeholder_end(node("eph")),
            string("!"),
        ]);
        let alerts = check(message(content));
        assert_eq!(names(&alerts), ["unextractable-content"]);
    }

    #[test]
    fn test_only_visible_attributes_are_checked() {
        let mut element = OutputElement::new("img", string(""));
        element.attributes = vec![
            attribute("src", string("/logo.png")),
            attribute("alt", string("Logo")),
        ];
        let expr = Expression::output_element(node("img"), SchemaTag::Known(html()), element);
        let alerts = check(message(expr));
        assert_eq!(names(&alerts), ["unextractable-content"]);
    }

    #[test]
    fn test_script_body_is_not_checked() {
        let mut element = OutputElement::new("script", string("var x = 1;"));
        element.inner_schema = Some(javascript());
        let expr = Expression::output_element(node("script"), SchemaTag::Known(html()), element);
        assert!(check(expr).is_empty());
    }

    #[test]
    fn test_nomsg_hides_text() {
        let alerts = check(Expression::no_message(node("nomsg"), string("Copyright")));
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_unnecessary_nomsg() {
        let alerts = check(Expression::no_message(node("nomsg"), native("x")));
        assert_eq!(names(&alerts), ["unnecessary-nomsg"]);
        assert_eq!(alerts.iter().next().map(|alert| alert.severity), Some(Severity::Warning));
    }

    #[test]
    fn test_parameter_defaults_follow_their_type() {
        let mut alerts = AlertSet::new();
        let script = Parameter::new(formal("script", Type::Content(javascript())))
            .with_default_value(string("alert(1)"));
        let title = Parameter::new(formal("title", Type::Content(html())))
            .with_default_value(string("Untitled"));
        let template = Template::new(
            node("page"),
            "com.example.Page",
            html(),
            vec![script, title],
            string(""),
        );
        I18nChecker::new(&mut alerts).check(&template);
        assert_eq!(names(&alerts), ["unextractable-content"]);
    }
}
