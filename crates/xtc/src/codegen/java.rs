//! Java backend.
//!
//! Lowers a compiled template (validated calls, escaped content, extracted
//! messages) into one Java class with a static `write` method, a
//! `getClosure` factory and a `getDefault*` accessor per default value.
//!
//! There are two lowering modes. Statement mode emits statements that write
//! to `out`. Expression mode produces one Java expression. A node that only
//! makes sense as statements (a conditional, a loop, markup, ...) becomes an
//! anonymous closure in expression mode, with its body lowered in statement
//! mode.

mod expr_check;

pub use expr_check::{ExpressionProblem, check_expression};

use super::{CodeWriter, OutputLanguage, VarNames};
use crate::alert::{AlertKind, AlertSink};
use crate::ast::{
    Attribute, Call, Conditional, ElementPart, Expression, ExpressionKind, LoopExpression,
    OutputElement, ValidatedCall,
};
use crate::callable::{Callable, FormalParameter, INSTANCE_PARAM_NAME, Import, Template};
use crate::config::CompilerConfig;
use crate::message::Message;
use crate::types::{LanguageMap, Type};
use crate::visit::unexpected_node;
use indexmap::IndexMap;

const PASS: &str = "java codegen";
const LANGUAGE: OutputLanguage = OutputLanguage::Java;
const OUT: &str = "out";
const CONTEXT: &str = "context";
const MESSAGE_SOURCE: &str = "XTC$MESSAGE_SOURCE";

const PRIMITIVES: [&str; 8] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double",
];

pub struct JavaCodeGenerator<'a> {
    config: &'a CompilerConfig,
}

impl<'a> JavaCodeGenerator<'a> {
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, template: &Template, alerts: &mut dyn AlertSink) -> String {
        let mut lowering = Lowering {
            writer: CodeWriter::new(),
            pending_text: String::new(),
            vars: VarNames::new(self.config.codegen.var_prefix.as_str()),
            alerts,
            has_message_source: self.config.codegen.message_source.is_some(),
        };
        lowering.class(self.config, template);
        log::debug!(
            "generated Java for {} ({} temporaries)",
            template.name,
            lowering.vars.count()
        );
        lowering.writer.finish()
    }
}

struct Lowering<'s> {
    writer: CodeWriter,
    /// Static text not yet written, merged into one `append`.
    pending_text: String,
    vars: VarNames,
    alerts: &'s mut dyn AlertSink,
    has_message_source: bool,
}

impl Lowering<'_> {
    fn flush_text(&mut self) {
        if !self.pending_text.is_empty() {
            let literal = java_string_literal(&std::mem::take(&mut self.pending_text));
            self.writer.line(format!("{OUT}.append({literal});"));
        }
    }

    fn text(&mut self, text: &str) {
        self.pending_text.push_str(text);
    }

    fn line(&mut self, text: impl AsRef<str>) {
        self.flush_text();
        self.writer.line(text);
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.flush_text();
        self.writer.open(text);
    }

    fn reopen(&mut self, text: impl AsRef<str>) {
        self.flush_text();
        self.writer.reopen(text);
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.flush_text();
        self.writer.close(text);
    }

    fn class(&mut self, config: &CompilerConfig, template: &Template) {
        self.line(format!(
            "// Generated from {}. Do not edit.",
            template.node.position.source
        ));
        let package = template
            .package()
            .map(str::to_string)
            .or_else(|| config.java.package.clone());
        if let Some(package) = package {
            self.line(format!("package {package};"));
        }
        self.writer.blank_line();
        self.line(format!("import {}.*;", config.java.runtime_package));
        for import in &template.imports {
            match import {
                Import::Class { name, .. } => self.line(format!("import {name};")),
                Import::Package { name, .. } => self.line(format!("import {name}.*;")),
            }
        }
        self.writer.blank_line();

        let class_name = template.simple_name();
        self.open(format!("public class {class_name} {{"));
        let message_source = config
            .codegen
            .message_source
            .as_deref()
            .map_or_else(|| "null".to_string(), java_string_literal);
        self.line(format!(
            "private static final String {MESSAGE_SOURCE} = {message_source};"
        ));
        self.writer.blank_line();

        let declarations: Vec<String> = template
            .parameters
            .iter()
            .map(|parameter| format!("final {} {}", java_type(&parameter.formal.ty), parameter.name()))
            .collect();
        let mut write_parameters = vec![
            format!("final java.lang.Appendable {OUT}"),
            format!("final Context {CONTEXT}"),
        ];
        write_parameters.extend(declarations.iter().cloned());
        self.open(format!(
            "public static void write({}) throws java.io.IOException {{",
            write_parameters.join(", ")
        ));
        self.statement(&template.content);
        self.close("}");
        self.writer.blank_line();

        let target_type = template.schema.target_type();
        let mut forwarded = vec![OUT.to_string(), CONTEXT.to_string()];
        forwarded.extend(template.parameters.iter().map(|parameter| parameter.name().to_string()));
        self.open(format!(
            "public static {target_type} getClosure({}) {{",
            declarations.join(", ")
        ));
        self.open(format!("return new {target_type}() {{"));
        self.line("@Override");
        self.open(write_impl_signature());
        self.line(format!("{class_name}.write({});", forwarded.join(", ")));
        self.close("}");
        self.close("};");
        self.close("}");

        for parameter in &template.parameters {
            if let Some(default) = &parameter.default_value {
                self.writer.blank_line();
                let value = self.expression(default);
                self.open(format!(
                    "public static {} getDefault{}() {{",
                    java_type(&parameter.formal.ty),
                    capitalize(parameter.name())
                ));
                self.line(format!("return {value};"));
                self.close("}");
            }
        }
        self.close("}");
    }

    fn statement(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::StringConstant { value } => self.text(value),
            ExpressionKind::Concatenation { values } => {
                for value in values {
                    self.statement(value);
                }
            }
            ExpressionKind::Conditional(conditional) => self.conditional(conditional),
            ExpressionKind::Loop(loop_expression) => self.loop_statement(expr, loop_expression),
            ExpressionKind::Call(Call::Validated(call)) => self.call_statement(call),
            ExpressionKind::Call(Call::Unbound(_) | Call::Bound(_)) => unexpected_node(PASS, expr),
            ExpressionKind::Escape { subexpression } => {
                let Some(schema) = expr.known_schema() else {
                    unexpected_node(PASS, expr)
                };
                let appender = schema.appender().to_string();
                let value = self.expression(subexpression);
                self.line(format!("{appender}.INSTANCE.append({OUT}, {CONTEXT}, {value});"));
            }
            ExpressionKind::ConvertibleToContent { subexpression }
            | ExpressionKind::NoMessage { subexpression }
            | ExpressionKind::Example { subexpression, .. } => self.statement(subexpression),
            ExpressionKind::OutputElement(element) => self.element(element),
            ExpressionKind::Placeholder { content, .. } => self.statement(content),
            ExpressionKind::ExtractedMessage {
                message,
                parameters,
            } => self.message(expr, message, parameters),
            ExpressionKind::Abbr {
                name,
                ty,
                value,
                content,
            } => {
                let value = self.expression(value);
                self.open("{");
                self.line(format!("final {} {name} = {value};", java_type(ty)));
                self.statement(content);
                self.close("}");
            }
            ExpressionKind::Exception { message } => {
                self.open("if (true) {");
                self.line(format!(
                    "throw new java.lang.UnsupportedOperationException({});",
                    java_string_literal(message)
                ));
                self.close("}");
            }
            ExpressionKind::BooleanConstant { .. }
            | ExpressionKind::ObjectConstant { .. }
            | ExpressionKind::ConstructedConstant { .. }
            | ExpressionKind::NativeExpression { .. }
            | ExpressionKind::PlaceholderStart { .. }
            | ExpressionKind::PlaceholderEnd
            | ExpressionKind::Collapse { .. }
            | ExpressionKind::UnextractedMessage { .. }
            | ExpressionKind::AttrBundleParam { .. } => unexpected_node(PASS, expr),
        }
    }

    fn conditional(&mut self, conditional: &Conditional) {
        for (index, clause) in conditional.clauses.iter().enumerate() {
            let predicate = self.expression(&clause.predicate);
            if index == 0 {
                self.open(format!("if ({predicate}) {{"));
            } else {
                self.reopen(format!("}} else if ({predicate}) {{"));
            }
            self.statement(&clause.expression);
        }
        if !conditional.else_expression.is_empty_string() {
            self.reopen("} else {");
            self.statement(&conditional.else_expression);
        }
        self.close("}");
    }

    fn loop_statement(&mut self, expr: &Expression, loop_expression: &LoopExpression) {
        let iterator = loop_expression.iterator.as_ref().filter(|value| can_evaluate(value));
        let iterable = loop_expression.iterable.as_ref().filter(|value| can_evaluate(value));
        if iterator.is_none() && iterable.is_none() {
            match (&loop_expression.iterable, &loop_expression.iterator) {
                (Some(missing), _) | (None, Some(missing)) => self.alerts.alert(
                    missing.position(),
                    AlertKind::MissingExpression {
                        language: LANGUAGE.to_string(),
                    },
                ),
                (None, None) => self.alerts.alert(
                    expr.position(),
                    AlertKind::LoopMissingIterableAndIterator {
                        var: loop_expression.var.clone(),
                    },
                ),
            }
            return;
        }

        let item_type = java_type(&loop_expression.ty);
        let var = &loop_expression.var;
        let has_delimiter = !loop_expression.delimiter.is_empty_string();
        // outer scope for temporaries
        self.open("{");
        let flag = self.vars.fresh("bool");
        if has_delimiter {
            self.line(format!("boolean {flag} = false;"));
        }
        let counter = loop_expression.key.as_ref().map(|_| self.vars.fresh("key"));
        if let Some(counter) = &counter {
            self.line(format!("int {counter} = 0;"));
        }
        match (iterator, iterable) {
            (Some(iterator), _) => {
                let iterator_var = self.vars.fresh("iter");
                let code = self.expression(iterator);
                self.line(format!(
                    "final java.util.Iterator<? extends {}> {iterator_var} = {code};",
                    reference_type(&item_type)
                ));
                self.open(format!("while ({iterator_var}.hasNext()) {{"));
                self.line(format!("final {item_type} {var} = {iterator_var}.next();"));
            }
            (None, Some(iterable)) => {
                let code = self.expression(iterable);
                self.open(format!("for (final {item_type} {var} : {code}) {{"));
            }
            (None, None) => unexpected_node(PASS, expr),
        }
        if has_delimiter {
            self.open(format!("if ({flag}) {{"));
            self.statement(&loop_expression.delimiter);
            self.reopen("} else {");
            self.line(format!("{flag} = true;"));
            self.close("}");
        }
        if let (Some(key), Some(counter)) = (&loop_expression.key, &counter) {
            self.line(format!("final int {key} = {counter}++;"));
        }
        self.statement(&loop_expression.subexpression);
        self.close("}");
        self.close("}");
    }

    fn call_statement(&mut self, call: &ValidatedCall) {
        let callee = &call.callee;
        let mut arguments = vec![OUT.to_string(), CONTEXT.to_string()];
        arguments.extend(self.call_arguments(callee, &call.attributes));
        if callee.is_instance() {
            let instance = self.vars.fresh("inst");
            let value = self.instance_value(&call.attributes);
            self.open("{");
            self.line(format!("final {} {instance} = {value};", callee.name()));
            self.line(format!("{instance}.write({});", arguments.join(", ")));
            self.close("}");
        } else {
            self.line(format!("{}.write({});", callee.name(), arguments.join(", ")));
        }
    }

    fn instance_value(&mut self, attributes: &IndexMap<String, Attribute>) -> String {
        match attributes.get(INSTANCE_PARAM_NAME) {
            Some(attribute) => self.expression(&attribute.value),
            None => "null".to_string(),
        }
    }

    /// Arguments in the callee's parameter order, `this` excluded. Absent and
    /// conditional arguments fall back to the parameter's default.
    fn call_arguments(
        &mut self,
        callee: &Callable,
        attributes: &IndexMap<String, Attribute>,
    ) -> Vec<String> {
        let mut arguments = Vec::new();
        for parameter in callee.parameters() {
            if callee.is_instance() && parameter.primary_name == INSTANCE_PARAM_NAME {
                continue;
            }
            let argument = match attributes.get(&parameter.primary_name) {
                Some(attribute) => {
                    let value = self.expression(&attribute.value);
                    match &attribute.condition {
                        Some(condition) => {
                            let condition = self.expression(condition);
                            let default = self.default_argument(callee, parameter);
                            format!("({condition} ? {value} : {default})")
                        }
                        None => value,
                    }
                }
                None => self.default_argument(callee, parameter),
            };
            arguments.push(argument);
        }
        arguments
    }

    fn default_argument(&mut self, callee: &Callable, parameter: &FormalParameter) -> String {
        if let Some(value) = parameter.ty.default_value(&parameter.node) {
            return self.expression(&value);
        }
        if parameter.has_default {
            return format!(
                "{}.getDefault{}()",
                callee.name(),
                capitalize(&parameter.primary_name)
            );
        }
        "null".to_string()
    }

    fn element(&mut self, element: &OutputElement) {
        if element.part == ElementPart::CloseTag {
            self.text(&format!("</{}>", element.local_name));
            return;
        }
        if let Some(doc_type) = &element.doc_type {
            self.text(&doc_type.to_markup());
        }
        self.text(&format!("<{}", element.local_name));
        for attribute in &element.attributes {
            match &attribute.condition {
                Some(condition) => {
                    let condition = self.expression(condition);
                    self.open(format!("if ({condition}) {{"));
                    self.element_attribute(attribute);
                    self.close("}");
                }
                None => self.element_attribute(attribute),
            }
        }
        for bundle in &element.attr_bundles {
            self.line(format!("{bundle}.write({OUT}, {CONTEXT});"));
        }
        self.text(">");
        if element.part == ElementPart::OpenTag || element.omits_close_tag() {
            return;
        }
        self.statement(&element.content);
        self.text(&format!("</{}>", element.local_name));
    }

    fn element_attribute(&mut self, attribute: &Attribute) {
        self.text(&format!(" {}=\"", attribute.name));
        self.statement(&attribute.value);
        self.text("\"");
    }

    fn message(&mut self, expr: &Expression, message: &Message, parameters: &[Expression]) {
        if !self.has_message_source {
            self.alerts.alert(expr.position(), AlertKind::NoMessageSource);
        }
        self.line(format!(
            "// MSG {}={}",
            message.id,
            message.pattern.replace(['\n', '\r'], " ")
        ));
        let mut lookup = format!(
            "Messages.get({MESSAGE_SOURCE}, {CONTEXT}.getLocale(), {}L",
            message.id
        );
        if parameters.is_empty() {
            lookup.push(')');
            self.line(format!("{OUT}.append({lookup});"));
            return;
        }
        self.open("{");
        for parameter in parameters {
            let var = self.vars.fresh("msg");
            let value = self.string_value(parameter);
            self.line(format!("final String {var} = {value};"));
            lookup.push_str(", ");
            lookup.push_str(&var);
        }
        lookup.push(')');
        self.line(format!("{OUT}.append({lookup});"));
        self.close("}");
    }

    /// Java expression evaluating to the escaped text of `expr`.
    fn string_value(&mut self, expr: &Expression) -> String {
        let value = self.expression(expr);
        match expr.known_schema() {
            Some(schema) => format!(
                "{}.INSTANCE.append(new java.lang.StringBuilder(), {CONTEXT}, {value}).toString()",
                schema.appender()
            ),
            None => format!("java.lang.String.valueOf({value})"),
        }
    }

    fn expression(&mut self, expr: &Expression) -> String {
        match &expr.kind {
            ExpressionKind::BooleanConstant { value } => value.to_string(),
            ExpressionKind::StringConstant { value } => match expr.known_schema() {
                None => java_string_literal(value),
                Some(schema) if value.is_empty() => format!("{}.EMPTY", schema.target_type()),
                Some(_) => self.closure(expr),
            },
            ExpressionKind::ObjectConstant { value, ty } => {
                self.object_constant(expr, value, ty.as_ref())
            }
            ExpressionKind::ConstructedConstant {
                value,
                callee,
                param,
            } => format!(
                "{}.construct{}({})",
                callee.name(),
                capitalize(param),
                java_string_literal(value)
            ),
            ExpressionKind::NativeExpression { code, .. } => self.native(expr, code),
            ExpressionKind::Call(Call::Validated(call)) => {
                let arguments = self.call_arguments(&call.callee, &call.attributes).join(", ");
                if call.callee.is_instance() {
                    let instance = self.instance_value(&call.attributes);
                    format!("{instance}.getClosure({arguments})")
                } else {
                    format!("{}.getClosure({arguments})", call.callee.name())
                }
            }
            ExpressionKind::Call(Call::Unbound(_) | Call::Bound(_)) => unexpected_node(PASS, expr),
            ExpressionKind::ConvertibleToContent { subexpression }
            | ExpressionKind::NoMessage { subexpression }
            | ExpressionKind::Example { subexpression, .. } => self.expression(subexpression),
            ExpressionKind::AttrBundleParam {
                include_attrs,
                attributes,
                forwarded,
            } => self.attr_bundle(include_attrs, attributes, forwarded),
            ExpressionKind::Concatenation { .. }
            | ExpressionKind::Conditional(_)
            | ExpressionKind::Loop(_)
            | ExpressionKind::Escape { .. }
            | ExpressionKind::OutputElement(_)
            | ExpressionKind::Placeholder { .. }
            | ExpressionKind::ExtractedMessage { .. }
            | ExpressionKind::Abbr { .. }
            | ExpressionKind::Exception { .. } => self.closure(expr),
            ExpressionKind::PlaceholderStart { .. }
            | ExpressionKind::PlaceholderEnd
            | ExpressionKind::Collapse { .. }
            | ExpressionKind::UnextractedMessage { .. } => unexpected_node(PASS, expr),
        }
    }

    /// Anonymous closure whose body is `expr` in statement mode.
    fn closure(&mut self, expr: &Expression) -> String {
        let target_type = expr
            .known_schema()
            .map_or("Closure", |schema| schema.target_type())
            .to_string();
        let outer_writer = std::mem::take(&mut self.writer);
        let outer_text = std::mem::take(&mut self.pending_text);
        self.open(format!("new {target_type}() {{"));
        self.line("@Override");
        self.open(write_impl_signature());
        self.statement(expr);
        self.close("}");
        self.close("}");
        let closure = std::mem::replace(&mut self.writer, outer_writer).finish();
        self.pending_text = outer_text;
        closure.trim_end().to_string()
    }

    fn object_constant(&mut self, expr: &Expression, value: &str, ty: Option<&Type>) -> String {
        let java_type = match ty {
            Some(Type::Native(native)) => native.get(LANGUAGE),
            _ => None,
        };
        let Some(java_type) = java_type else {
            return java_string_literal(value);
        };
        if PRIMITIVES.contains(&java_type) {
            return primitive_literal(java_type, value).unwrap_or_else(|| {
                self.alerts.alert(
                    expr.position(),
                    AlertKind::InvalidAttributeValue {
                        value: value.to_string(),
                    },
                );
                primitive_zero(java_type).to_string()
            });
        }
        if matches!(java_type, "String" | "java.lang.String") {
            return java_string_literal(value);
        }
        format!("{java_type}.valueOf({})", java_string_literal(value))
    }

    fn native(&mut self, expr: &Expression, code: &LanguageMap) -> String {
        let Some(code) = code.get(LANGUAGE) else {
            self.alerts.alert(
                expr.position(),
                AlertKind::MissingExpression {
                    language: LANGUAGE.to_string(),
                },
            );
            return "null".to_string();
        };
        match check_expression(code) {
            Ok(()) => format!("({code})"),
            Err(ExpressionProblem::Illegal) => {
                self.alerts.alert(
                    expr.position(),
                    AlertKind::IllegalExpression {
                        language: LANGUAGE.to_string(),
                        code: code.to_string(),
                    },
                );
                "null".to_string()
            }
            Err(ExpressionProblem::Operator(operator)) => {
                self.alerts.alert(
                    expr.position(),
                    AlertKind::IllegalOperator {
                        language: LANGUAGE.to_string(),
                        operator,
                    },
                );
                "null".to_string()
            }
        }
    }

    fn attr_bundle(
        &mut self,
        include_attrs: &[String],
        attributes: &IndexMap<String, Attribute>,
        forwarded: &[String],
    ) -> String {
        let mut code = String::from("AttributeBundle.builder()");
        for bundle in forwarded {
            if include_attrs.is_empty() {
                code.push_str(&format!(".addAll({bundle})"));
            } else {
                let names: Vec<String> = include_attrs
                    .iter()
                    .map(|name| java_string_literal(name))
                    .collect();
                code.push_str(&format!(".addAll({bundle}, {})", names.join(", ")));
            }
        }
        for (name, attribute) in attributes {
            let name = java_string_literal(name);
            let value = self.expression(&attribute.value);
            match &attribute.condition {
                Some(condition) => {
                    let condition = self.expression(condition);
                    code.push_str(&format!(".addIf({condition}, {name}, {value})"));
                }
                None => code.push_str(&format!(".add({name}, {value})")),
            }
        }
        code.push_str(".build()");
        code
    }
}

fn write_impl_signature() -> String {
    format!(
        "protected void writeImpl(final java.lang.Appendable {OUT}, final Context {CONTEXT}) throws java.io.IOException {{"
    )
}

/// Whether a loop source has code for this backend.
fn can_evaluate(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::NativeExpression { code, .. } => code.get(LANGUAGE).is_some(),
        _ => true,
    }
}

fn java_type(ty: &Type) -> String {
    match ty {
        Type::Boolean => "boolean".to_string(),
        Type::Content(schema) => schema.target_type().to_string(),
        Type::Native(native) => native.get(LANGUAGE).unwrap_or("java.lang.Object").to_string(),
        Type::Bundle(_) => "AttributeBundle".to_string(),
        Type::Template(name) | Type::Instance(name) => name.clone(),
    }
}

fn reference_type(java_type: &str) -> &str {
    match java_type {
        "boolean" => "Boolean",
        "byte" => "Byte",
        "char" => "Character",
        "short" => "Short",
        "int" => "Integer",
        "long" => "Long",
        "float" => "Float",
        "double" => "Double",
        other => other,
    }
}

fn primitive_literal(java_type: &str, value: &str) -> Option<String> {
    match java_type {
        "boolean" => matches!(value, "true" | "false").then(|| value.to_string()),
        "byte" | "short" | "int" => value.parse::<i32>().is_ok().then(|| value.to_string()),
        "long" => value.parse::<i64>().is_ok().then(|| format!("{value}L")),
        "float" => value.parse::<f32>().is_ok().then(|| format!("{value}f")),
        "double" => value.parse::<f64>().is_ok().then(|| value.to_string()),
        "char" => {
            let mut characters = value.chars();
            match (characters.next(), characters.next()) {
                (Some(character), None) => Some(java_char_literal(character)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn primitive_zero(java_type: &str) -> &'static str {
    match java_type {
        "boolean" => "false",
        "char" => "'\\0'",
        _ => "0",
    }
}

fn capitalize(name: &str) -> String {
    let mut characters = name.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

fn push_escaped(literal: &mut String, character: char, quote: char) {
    match character {
        '\\' => literal.push_str("\\\\"),
        '\n' => literal.push_str("\\n"),
        '\r' => literal.push_str("\\r"),
        '\t' => literal.push_str("\\t"),
        character if character == quote => {
            literal.push('\\');
            literal.push(character);
        }
        character if character.is_ascii() && !character.is_ascii_control() => {
            literal.push(character)
        }
        character => {
            let mut units = [0; 2];
            for unit in character.encode_utf16(&mut units) {
                literal.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
}

pub fn java_string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for character in text.chars() {
        push_escaped(&mut literal, character, '"');
    }
    literal.push('"');
    literal
}

fn java_char_literal(character: char) -> String {
    let mut literal = String::from("'");
    push_escaped(&mut literal, character, '\'');
    literal.push('\'');
    literal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSet;
    use crate::ast::{Clause, LoopExpression};
    use crate::callable::{CallableKind, Parameter};
    use crate::schema::SchemaTag;
    use crate::testing::{attribute, formal, html, native, node, typed_string};
    use crate::types::NativeType;

    fn template(content: Expression) -> Template {
        Template::new(node("template"), "com.example.Card", html(), vec![], content)
    }

    fn generate(template: &Template) -> (String, AlertSet) {
        let config = CompilerConfig::default();
        let mut alerts = AlertSet::new();
        let code = JavaCodeGenerator::new(&config).generate(template, &mut alerts);
        (code, alerts)
    }

    fn escaped(code: &str) -> Expression {
        Expression::escape(node("escape"), html(), native(code))
    }

    fn if_else() -> Expression {
        Expression::conditional(
            node("if"),
            SchemaTag::Known(html()),
            vec![Clause::new(node("clause"), native("flag"), typed_string("yes", html()))],
            typed_string("no", html()),
        )
        .unwrap()
    }

    #[test]
    fn test_class_skeleton() {
        let (code, alerts) = generate(&template(typed_string("<p>hi</p>", html())));
        assert!(alerts.is_empty());
        assert!(code.contains("package com.example;"), "{code}");
        assert!(code.contains("import xtc.runtime.*;"), "{code}");
        assert!(code.contains("public class Card {"), "{code}");
        assert!(code.contains("out.append(\"<p>hi</p>\");"), "{code}");
        assert!(code.contains("public static HtmlClosure getClosure() {"), "{code}");
        assert!(code.contains("Card.write(out, context);"), "{code}");
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let content = Expression::concat(
            node("c"),
            SchemaTag::Known(html()),
            vec![typed_string("a", html()), escaped("x"), typed_string("b", html())],
        );
        let (code, _) = generate(&template(content));
        assert!(code.contains("out.append(\"a\");\n"), "{code}");
        assert!(code.contains("HtmlAppender.INSTANCE.append(out, context, (x));"), "{code}");
        assert!(code.contains("out.append(\"b\");\n"), "{code}");
    }

    #[test]
    fn test_if_else_in_statement_mode() {
        let (code, _) = generate(&template(if_else()));
        assert!(code.contains("if ((flag)) {"), "{code}");
        assert!(code.contains("} else {"), "{code}");
        // only getClosure builds a closure
        assert_eq!(code.matches("new HtmlClosure() {").count(), 1, "{code}");
    }

    #[test]
    fn test_empty_else_is_omitted() {
        let conditional = Expression::conditional(
            node("if"),
            SchemaTag::Known(html()),
            vec![Clause::new(node("clause"), native("flag"), typed_string("yes", html()))],
            typed_string("", html()),
        )
        .unwrap();
        let (code, _) = generate(&template(conditional));
        assert!(!code.contains("} else {"), "{code}");
    }

    #[test]
    fn test_elements_and_abbreviations() {
        let mut link = OutputElement::new("a", escaped("label"));
        link.attributes = vec![attribute("href", escaped("url")).with_condition(native("hasUrl"))];
        let abbr = Expression::abbr(
            node("abbr"),
            "n",
            Type::Native(NativeType::new("int")),
            native("count"),
            escaped("n"),
        );
        let content = Expression::concat(
            node("c"),
            SchemaTag::Known(html()),
            vec![
                Expression::output_element(node("a"), SchemaTag::Known(html()), link),
                Expression::output_element(
                    node("br"),
                    SchemaTag::Known(html()),
                    OutputElement::new("br", typed_string("", html())),
                ),
                abbr,
            ],
        );
        let (code, alerts) = generate(&template(content));
        assert!(alerts.is_empty());
        assert!(code.contains("out.append(\"<a\");"), "{code}");
        assert!(code.contains("if ((hasUrl)) {"), "{code}");
        assert!(code.contains("HtmlAppender.INSTANCE.append(out, context, (url));"), "{code}");
        assert!(code.contains("</a><br>"), "{code}");
        assert!(!code.contains("</br>"), "{code}");
        assert!(code.contains("final int n = (count);"), "{code}");
    }

    #[test]
    fn test_element_tags_render_alone() {
        let mut link = OutputElement::new("a", typed_string("", html()));
        link.attributes = vec![attribute("href", typed_string("/home", html()))];
        let tag = |part| {
            Expression::output_element(
                node("a"),
                SchemaTag::Known(html()),
                link.tag(part, typed_string("", html())),
            )
        };
        let content = Expression::concat(
            node("c"),
            SchemaTag::Known(html()),
            vec![tag(ElementPart::OpenTag), typed_string("Home", html()), tag(ElementPart::CloseTag)],
        );
        let (code, alerts) = generate(&template(content));
        assert!(alerts.is_empty());
        assert!(code.contains("<a href=\\\"/home\\\">Home</a>"), "{code}");
        assert_eq!(code.matches("</a>").count(), 1, "{code}");
    }

    #[test]
    fn test_call_argument_becomes_closure() {
        let callee = Callable::new(
            "com.example.Box",
            html(),
            vec![formal("body", Type::Content(html()))],
            CallableKind::Static,
        );
        let mut attributes = IndexMap::new();
        attributes.insert("body".to_string(), attribute("body", if_else()));
        let call = Expression::call(
            node("call"),
            Call::Validated(ValidatedCall { callee, attributes }),
        );
        let (code, _) = generate(&template(call));
        assert!(code.contains("com.example.Box.write(out, context, new HtmlClosure() {"), "{code}");
        assert!(code.contains("if ((flag)) {"), "{code}");
    }

    #[test]
    fn test_conditional_argument_falls_back_to_default() {
        let callee = Callable::new(
            "com.example.Box",
            html(),
            vec![formal("open", Type::Boolean)],
            CallableKind::Static,
        );
        let mut attributes = IndexMap::new();
        attributes.insert(
            "open".to_string(),
            attribute("open", native("isOpen")).with_condition(native("known")),
        );
        let call = Expression::call(
            node("call"),
            Call::Validated(ValidatedCall { callee, attributes }),
        );
        let (code, _) = generate(&template(call));
        assert!(code.contains("com.example.Box.write(out, context, ((known) ? (isOpen) : false));"), "{code}");
    }

    #[test]
    fn test_loop_with_delimiter_and_key() {
        let loop_expression = Expression::loop_expression(
            node("loop"),
            LoopExpression {
                var: "item".to_string(),
                ty: Type::Native(NativeType::new("String")),
                key: Some("index".to_string()),
                iterable: Some(native("items")),
                iterator: None,
                subexpression: escaped("item"),
                delimiter: typed_string(", ", html()),
            },
        );
        let (code, alerts) = generate(&template(loop_expression));
        assert!(alerts.is_empty());
        assert!(code.contains("boolean xtc$bool$1 = false;"), "{code}");
        assert!(code.contains("int xtc$key$2 = 0;"), "{code}");
        assert!(code.contains("for (final String item : (items)) {"), "{code}");
        assert!(code.contains("xtc$bool$1 = true;"), "{code}");
        assert!(code.contains("final int index = xtc$key$2++;"), "{code}");
    }

    #[test]
    fn test_loop_over_iterator() {
        let loop_expression = Expression::loop_expression(
            node("loop"),
            LoopExpression {
                var: "count".to_string(),
                ty: Type::Native(NativeType::new("int")),
                key: None,
                iterable: None,
                iterator: Some(native("counts.iterator()")),
                subexpression: escaped("count"),
                delimiter: typed_string("", html()),
            },
        );
        let (code, _) = generate(&template(loop_expression));
        assert!(
            code.contains("final java.util.Iterator<? extends Integer> xtc$iter$2 = (counts.iterator());"),
            "{code}"
        );
        assert!(code.contains("while (xtc$iter$2.hasNext()) {"), "{code}");
    }

    #[test]
    fn test_loop_without_source() {
        let loop_expression = Expression::loop_expression(
            node("loop"),
            LoopExpression {
                var: "item".to_string(),
                ty: Type::Native(NativeType::new("String")),
                key: None,
                iterable: None,
                iterator: None,
                subexpression: escaped("item"),
                delimiter: typed_string("", html()),
            },
        );
        let (_, alerts) = generate(&template(loop_expression));
        assert!(matches!(
            alerts.iter().next().map(|alert| &alert.kind),
            Some(AlertKind::LoopMissingIterableAndIterator { .. })
        ));
    }

    #[test]
    fn test_illegal_native_code() {
        let (_, alerts) = generate(&template(escaped("count++")));
        match alerts.iter().next().map(|alert| &alert.kind) {
            Some(AlertKind::IllegalOperator { operator, .. }) => assert_eq!(operator, "++"),
            other => panic!("Expected IllegalOperator, got {:?}", other),
        }
    }

    #[test]
    fn test_message_lookup() {
        let message = Message::new(None, None, false, "Hello %1");
        let id = message.id;
        let extracted = Expression::extracted_message(
            node("msg"),
            SchemaTag::Known(html()),
            message,
            vec![escaped("name")],
        );
        let (code, alerts) = generate(&template(extracted));
        assert!(code.contains(&format!("// MSG {id}=Hello %1")), "{code}");
        assert!(code.contains("final String xtc$msg$1 = HtmlAppender.INSTANCE.append(new java.lang.StringBuilder(), context, new HtmlClosure() {"), "{code}");
        assert!(
            code.contains(&format!("out.append(Messages.get(XTC$MESSAGE_SOURCE, context.getLocale(), {id}L, xtc$msg$1));")),
            "{code}"
        );
        assert!(matches!(
            alerts.iter().next().map(|alert| &alert.kind),
            Some(AlertKind::NoMessageSource)
        ));
    }

    #[test]
    fn test_default_accessor() {
        let title = Parameter::new(formal("title", Type::Native(NativeType::new("String"))))
            .with_default_value(native("\"Untitled\""));
        let template = Template::new(
            node("template"),
            "com.example.Card",
            html(),
            vec![title],
            typed_string("", html()),
        );
        let (code, _) = generate(&template);
        assert!(code.contains("public static String getDefaultTitle() {"), "{code}");
        assert!(code.contains("return (\"Untitled\");"), "{code}");
        assert!(code.contains("public static void write(final java.lang.Appendable out, final Context context, final String title)"), "{code}");
    }

    #[test]
    fn test_object_constants() {
        let config = CompilerConfig::default();
        let mut alerts = AlertSet::new();
        let mut lowering = Lowering {
            writer: CodeWriter::new(),
            pending_text: String::new(),
            vars: VarNames::new(config.codegen.var_prefix.as_str()),
            alerts: &mut alerts,
            has_message_source: false,
        };
        let int = Type::Native(NativeType::new("int"));
        let object = Expression::object(node("count"), "3").with_object_type(int.clone());
        assert_eq!(lowering.expression(&object), "3");
        let bad = Expression::object(node("count"), "three").with_object_type(int);
        assert_eq!(lowering.expression(&bad), "0");
        let locale = Expression::object(node("locale"), "en").with_object_type(Type::Native(NativeType::new("Locale")));
        assert_eq!(lowering.expression(&locale), "Locale.valueOf(\"en\")");
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(java_string_literal("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(java_string_literal("é"), "\"\\u00e9\"");
        assert_eq!(java_char_literal('\''), "'\\''");
        assert_eq!(capitalize("title"), "Title");
    }

    #[test]
    #[should_panic(expected = "unexpected BoundCall")]
    fn test_bound_call_is_a_defect() {
        let callee = Callable::new("com.example.Box", html(), vec![], CallableKind::Static);
        let call = Expression::call(
            node("call"),
            Call::Bound(crate::ast::BoundCall {
                callee,
                attributes: IndexMap::new(),
                attr_bundles: Vec::new(),
            }),
        );
        generate(&template(call));
    }
}
