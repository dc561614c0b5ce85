//! Applies whitespace rules to static text.
//!
//! Text regions arrive wrapped in collapse nodes carrying the operators the
//! template asked for. Operators a node leaves unset come from its context:
//! markup content collapses interior runs and removes them at the ends,
//! element attributes and messages normalize interior runs, and `<pre>`
//! keeps everything.

use super::TemplatePass;
use crate::ast::{Attribute, Expression, ExpressionKind, SpaceOperator, SpaceOperators};
use crate::visit::{Rewriter, rewrite_children, unexpected_node};

const DEFAULT_SPACES: SpaceOperators =
    SpaceOperators::new(SpaceOperator::Collapse, SpaceOperator::Remove);
const PRESERVING_SPACES: SpaceOperators =
    SpaceOperators::new(SpaceOperator::Preserve, SpaceOperator::Preserve);
const ATTRIBUTE_SPACES: SpaceOperators =
    SpaceOperators::new(SpaceOperator::Normalize, SpaceOperator::Remove);
const MESSAGE_SPACES: SpaceOperators =
    SpaceOperators::new(SpaceOperator::Normalize, SpaceOperator::Remove);

const PRESERVING_ELEMENTS: [&str; 2] = ["pre", "textarea"];

pub struct SpaceCollapser {
    spaces: SpaceOperators,
    /// Attributes met now belong to an output element, not a call.
    element_attributes: bool,
    collapsed: usize,
}

impl Default for SpaceCollapser {
    fn default() -> Self {
        Self {
            spaces: DEFAULT_SPACES,
            element_attributes: true,
            collapsed: 0,
        }
    }
}

impl SpaceCollapser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collapsed_regions(&self) -> usize {
        self.collapsed
    }

    fn with_spaces<T>(&mut self, spaces: SpaceOperators, f: impl FnOnce(&mut Self) -> T) -> T {
        let outer = std::mem::replace(&mut self.spaces, spaces);
        let result = f(self);
        self.spaces = outer;
        result
    }

    fn with_element_attributes<T>(&mut self, enabled: bool, f: impl FnOnce(&mut Self) -> T) -> T {
        let outer = std::mem::replace(&mut self.element_attributes, enabled);
        let result = f(self);
        self.element_attributes = outer;
        result
    }
}

impl Rewriter for SpaceCollapser {
    fn rewrite_node(&mut self, expr: &Expression) -> Expression {
        match &expr.kind {
            ExpressionKind::Collapse {
                subexpression,
                spaces,
            } => {
                let spaces = spaces.inherit_from(self.spaces);
                let searched = self.with_spaces(spaces, |this| this.rewrite(subexpression));
                self.collapsed += 1;
                collapse(&searched, spaces)
            }
            ExpressionKind::UnextractedMessage { .. } | ExpressionKind::NoMessage { .. } => {
                self.with_spaces(MESSAGE_SPACES, |this| rewrite_children(this, expr))
            }
            ExpressionKind::OutputElement(element) => {
                let spaces = if PRESERVING_ELEMENTS.contains(&element.local_name.as_str()) {
                    PRESERVING_SPACES
                } else {
                    self.spaces
                };
                self.with_element_attributes(true, |this| {
                    this.with_spaces(spaces, |this| rewrite_children(this, expr))
                })
            }
            ExpressionKind::Call(_) => {
                self.with_element_attributes(false, |this| rewrite_children(this, expr))
            }
            ExpressionKind::ExtractedMessage { .. } => unexpected_node("space collapser", expr),
            _ => rewrite_children(self, expr),
        }
    }

    fn rewrite_attribute(&mut self, attribute: &Attribute) -> Attribute {
        let spaces = if self.element_attributes {
            ATTRIBUTE_SPACES
        } else {
            self.spaces
        };
        self.with_spaces(spaces, |this| {
            let value = this.rewrite(&attribute.value);
            let condition = attribute
                .condition
                .as_ref()
                .map(|condition| this.rewrite_value(condition));
            attribute.with_value_and_condition(value, condition)
        })
    }
}

impl TemplatePass for SpaceCollapser {}

fn is_space(c: char) -> bool {
    c.is_ascii_whitespace()
}

/// Static text between two dynamic values.
#[derive(Default)]
struct TextRun<'e> {
    text: String,
    first: Option<&'e Expression>,
}

/// Collapses the static text at the top level of `expr`.
fn collapse(expr: &Expression, spaces: SpaceOperators) -> Expression {
    let values = match &expr.kind {
        ExpressionKind::StringConstant { .. } => std::slice::from_ref(expr),
        ExpressionKind::Concatenation { values } => values.as_slice(),
        _ => return expr.clone(),
    };
    let interior = spaces.interior.unwrap_or(SpaceOperator::Preserve);
    let exterior = spaces.exterior.unwrap_or(SpaceOperator::Preserve);

    // one more run than dynamic values
    let mut runs = vec![TextRun::default()];
    let mut dynamic = Vec::new();
    for value in values {
        match &value.kind {
            ExpressionKind::StringConstant { value: text } => {
                if let Some(run) = runs.last_mut() {
                    run.text.push_str(text);
                    run.first.get_or_insert(value);
                }
            }
            _ => {
                dynamic.push(value);
                runs.push(TextRun::default());
            }
        }
    }

    let leading = take_leading(&mut runs[0].text);
    let last = runs.len() - 1;
    let trailing = take_trailing(&mut runs[last].text);
    for run in &mut runs {
        run.text = map_spaces(&run.text, interior);
    }
    runs[0].text.insert_str(0, exterior.apply(&leading));
    runs[last].text.push_str(exterior.apply(&trailing));

    let mut output = Vec::with_capacity(values.len());
    for (index, run) in runs.into_iter().enumerate() {
        match run.first {
            Some(first) if !run.text.is_empty() => {
                output.push(Expression::string(first.node.clone(), first.schema.clone(), run.text))
            }
            _ => {}
        }
        if let Some(value) = dynamic.get(index) {
            output.push((*value).clone());
        }
    }
    Expression::concat(expr.node.clone(), expr.schema.clone(), output)
}

fn take_leading(text: &mut String) -> String {
    let end = text.find(|c: char| !is_space(c)).unwrap_or(text.len());
    text.drain(..end).collect()
}

fn take_trailing(text: &mut String) -> String {
    let start = text.trim_end_matches(is_space).len();
    text.split_off(start)
}

/// Replaces every run of whitespace in `text`.
fn map_spaces(text: &str, operator: SpaceOperator) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(is_space) {
        output.push_str(&rest[..start]);
        let spaces = &rest[start..];
        let end = spaces.find(|c: char| !is_space(c)).unwrap_or(spaces.len());
        output.push_str(operator.apply(&spaces[..end]));
        rest = &spaces[end..];
    }
    output.push_str(rest);
    output
}
