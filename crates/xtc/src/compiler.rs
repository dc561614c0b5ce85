//! The compilation pipeline.
//!
//! A parsed template flows through bind, space collapsing, validate,
//! escape, placeholder pivoting and message extraction, then Java
//! generation. The i18n check reads the collapsed tree. Every tree pass runs
//! even after errors so a single compile reports as much as it can. Code is
//! only generated from a tree without errors.

mod bind;
mod collapse;
mod escape;
mod extract;
mod i18n;
mod placeholder;
mod validate;

pub use bind::Binder;
pub use collapse::SpaceCollapser;
pub use escape::Escaper;
pub use extract::MessageExtractor;
pub use i18n::I18nChecker;
pub use placeholder::PlaceholderPivoter;
pub use validate::Validator;

use crate::alert::AlertSet;
use crate::ast::Expression;
use crate::callable::{CallableRegistry, Parameter, Template};
use crate::codegen::JavaCodeGenerator;
use crate::config::CompilerConfig;
use crate::message::Message;
use crate::schema::SchemaRegistry;
use crate::visit::Rewriter;

/// Collaborators of a compilation.
pub struct CompileContext<'a> {
    pub config: &'a CompilerConfig,
    pub schemas: &'a dyn SchemaRegistry,
    pub callables: &'a dyn CallableRegistry,
}

#[derive(Debug)]
pub struct CompiledUnit {
    /// The template after the last tree pass.
    pub template: Template,
    pub messages: Vec<Message>,
    /// Java source, `None` when the compilation has errors.
    pub code: Option<String>,
    pub alerts: AlertSet,
}

impl CompiledUnit {
    pub fn is_success(&self) -> bool {
        self.code.is_some()
    }
}

/// A rewriter applied to a whole template: every parameter default, then
/// the body.
pub trait TemplatePass: Rewriter {
    fn rewrite_default(&mut self, _parameter: &Parameter, value: &Expression) -> Expression {
        self.rewrite(value)
    }

    fn rewrite_content(&mut self, template: &Template) -> Expression {
        self.rewrite(&template.content)
    }

    fn apply(&mut self, template: &Template) -> Template {
        let parameters = template
            .parameters
            .iter()
            .map(|parameter| match &parameter.default_value {
                Some(value) => Parameter {
                    default_value: Some(self.rewrite_default(parameter, value)),
                    ..parameter.clone()
                },
                None => parameter.clone(),
            })
            .collect();
        let content = self.rewrite_content(template);
        Template {
            parameters,
            ..template.with_content(content)
        }
    }
}

pub fn compile(context: &CompileContext<'_>, template: &Template) -> CompiledUnit {
    let mut alerts = AlertSet::with_policy(context.config.alert_policy());
    log::debug!("compiling {}", template.name);

    let mut binder = Binder::new(context.callables, &mut alerts);
    let bound = binder.apply(template);
    log::debug!("bind: {} calls bound", binder.bound_calls());

    let mut collapser = SpaceCollapser::new();
    let collapsed = collapser.apply(&bound);
    log::debug!("collapse: {} text regions", collapser.collapsed_regions());

    let mut checker = I18nChecker::new(&mut alerts);
    checker.check(&collapsed);
    log::debug!("i18n check: {} unextractable strings", checker.unextractable());

    let mut validator = Validator::new(&collapsed, context.schemas, &mut alerts);
    let validated = validator.apply(&collapsed);
    log::debug!("validate: {} calls validated", validator.validated_calls());

    let escaped = Escaper::new(bound.schema.clone(), context.schemas, &mut alerts).apply(&validated);
    log::debug!("escape: {} alerts so far", alerts.len());

    let mut pivoter = PlaceholderPivoter::new(&mut alerts);
    let pivoted = pivoter.apply(&escaped);
    log::debug!("pivot: {} placeholders", pivoter.placeholders());

    let mut extractor = MessageExtractor::new(&mut alerts);
    let extracted = extractor.apply(&pivoted);
    let messages = extractor.into_messages();
    log::debug!("extract: {} messages", messages.len());

    let code = if alerts.has_errors() {
        log::debug!(
            "skipping code generation for {}: {} errors",
            template.name,
            alerts.errors().count()
        );
        None
    } else {
        let code = JavaCodeGenerator::new(context.config).generate(&extracted, &mut alerts);
        (!alerts.has_errors()).then_some(code)
    };

    CompiledUnit {
        template: extracted,
        messages,
        code,
        alerts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use crate::ast::{Call, Clause, ExpressionKind};
    use crate::callable::CallableSet;
    use crate::schema::{SchemaSet, SchemaTag};
    use crate::testing::{attribute, formal, html, native, node, string, unbound_call};
    use crate::types::Type;

    struct Fixture {
        config: CompilerConfig,
        schemas: SchemaSet,
        callables: CallableSet,
    }

    impl Fixture {
        fn new() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let body = formal("body", Type::Content(html())).consuming_content();
            let boxed = Template::new(
                node("box"),
                "com.example.Box",
                html(),
                vec![Parameter::new(body)],
                string(""),
            );
            let mut callables = CallableSet::new();
            callables.insert_template(&boxed);
            Self {
                config: CompilerConfig::from_str("[codegen]\nmessage_source = \"com.example.Messages\"")
                    .unwrap(),
                schemas: SchemaSet::builtin(),
                callables,
            }
        }

        fn compile(&self, content: Expression) -> CompiledUnit {
            let context = CompileContext {
                config: &self.config,
                schemas: &self.schemas,
                callables: &self.callables,
            };
            let template = Template::new(node("page"), "com.example.Page", html(), vec![], content);
            compile(&context, &template)
        }
    }

    fn if_else() -> Expression {
        Expression::conditional(
            node("if"),
            SchemaTag::Untyped,
            vec![Clause::new(node("clause"), native("flag"), string("<b>on</b>"))],
            string("off"),
        )
        .unwrap()
    }

    fn kinds(unit: &CompiledUnit) -> Vec<&AlertKind> {
        unit.alerts.iter().map(|alert| &alert.kind).collect()
    }

    #[test]
    fn test_if_else_lowers_to_branches() {
        let fixture = Fixture::new();
        let unit = fixture.compile(if_else());
        let code = unit.code.expect("code");
        assert!(code.contains("if ((flag)) {"), "{code}");
        assert!(code.contains("out.append(\"&lt;b&gt;on&lt;/b&gt;\");"), "{code}");
        assert!(code.contains("} else {"), "{code}");
        assert!(code.contains("out.append(\"off\");"), "{code}");
        assert_eq!(code.matches("new HtmlClosure()").count(), 1, "{code}");
    }

    #[test]
    fn test_if_else_as_argument_becomes_closure() {
        let fixture = Fixture::new();
        let unit = fixture.compile(unbound_call("com.example.Box", vec![], if_else()));
        assert!(!unit.alerts.has_errors(), "{:?}", kinds(&unit));
        let code = unit.code.expect("code");
        assert!(
            code.contains("com.example.Box.write(out, context, new HtmlClosure() {"),
            "{code}"
        );
        assert_eq!(code.matches("new HtmlClosure()").count(), 2, "{code}");
        assert!(code.contains("if ((flag)) {"), "{code}");
    }

    #[test]
    fn test_unknown_attribute_is_rejected_when_validating() {
        let fixture = Fixture::new();
        let call = unbound_call(
            "com.example.Box",
            vec![attribute("colour", Expression::object(node("colour"), "red"))],
            string("x"),
        );
        let template = Template::new(node("page"), "com.example.Page", html(), vec![], call);

        let mut alerts = AlertSet::new();
        let bound = Binder::new(&fixture.callables, &mut alerts).apply(&template);
        assert!(alerts.is_empty());
        let ExpressionKind::Call(Call::Bound(call)) = &bound.content.kind else {
            panic!("Expected BoundCall, got {:?}", bound.content.kind);
        };
        assert!(call.attributes.contains_key("colour"));

        let validated = Validator::new(&bound, &fixture.schemas, &mut alerts).apply(&bound);
        match kinds_of(&alerts).as_slice() {
            [AlertKind::BadParameter { name, .. }] => assert_eq!(name, "colour"),
            other => panic!("Expected BadParameter, got {:?}", other),
        }
        let ExpressionKind::Call(Call::Validated(call)) = &validated.content.kind else {
            panic!("Expected ValidatedCall, got {:?}", validated.content.kind);
        };
        assert_eq!(call.attributes.keys().collect::<Vec<_>>(), ["body"]);
    }

    fn kinds_of(alerts: &AlertSet) -> Vec<&AlertKind> {
        alerts.iter().map(|alert| &alert.kind).collect()
    }

    #[test]
    fn test_message_end_to_end() {
        let fixture = Fixture::new();
        let content = Expression::concat(
            node("c"),
            SchemaTag::Untyped,
            vec![
                string("Hello "),
                Expression::placeholder_start(node("ph"), "name", Some("Ann".to_string())),
                native("user.getName()"),
                Expression::placeholder_end(node("eph")),
                string(", 100% done"),
            ],
        );
        let message = Expression::unextracted_message(
            node("msg"),
            SchemaTag::Untyped,
            None,
            None,
            false,
            content,
        );
        let unit = fixture.compile(message);
        assert!(unit.alerts.is_empty(), "{:?}", kinds(&unit));
        assert_eq!(unit.messages.len(), 1);
        assert_eq!(unit.messages[0].pattern, "Hello %1, 100%% done");
        let code = unit.code.expect("code");
        assert!(code.contains("\"com.example.Messages\""), "{code}");
        assert!(code.contains("Messages.get(XTC$MESSAGE_SOURCE"), "{code}");
    }

    #[test]
    fn test_errors_skip_code_generation() {
        let fixture = Fixture::new();
        let unit = fixture.compile(unbound_call("com.example.Missing", vec![], string("")));
        assert!(!unit.is_success());
        assert!(matches!(kinds(&unit).as_slice(), [AlertKind::CallableNotFound { .. }]));
        assert!(unit.template.content.is_empty_string());
    }

    #[test]
    fn test_ignored_alerts_do_not_fail() {
        let mut fixture = Fixture::new();
        fixture.config = CompilerConfig::from_str(
            "[alerts]\nignore = [\"callable-not-found\"]",
        )
        .unwrap();
        let unit = fixture.compile(unbound_call("com.example.Missing", vec![], string("")));
        assert!(unit.alerts.is_empty());
        assert!(unit.is_success());
    }
}
