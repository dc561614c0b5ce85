//! Source positions attached to every IR node.
//!
//! Positions come from the parser, which is outside this crate. A position
//! names its source with an `Arc<str>`, so cloning one is cheap and every
//! node stays `Send + Sync`.
//!
//! `SourceCode` holds the text of one template. It maps byte offsets to
//! positions and feeds the alert renderer.

use chumsky::span::SimpleSpan;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

pub type Span = SimpleSpan;

/// Name of a template source, usually its path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceName(Arc<str>);

impl SourceName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        SourceName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a node: source name, 1-based line and column, and the
/// byte span used for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub source: SourceName,
    pub line: u32,
    pub column: u32,
    pub span: Span,
}

impl SourcePosition {
    pub fn new(source: SourceName, line: u32, column: u32, span: Span) -> Self {
        Self {
            source,
            line,
            column,
            span,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.span.into_range()
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

impl Serialize for SourcePosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let range = self.range();
        let mut state = serializer.serialize_struct("SourcePosition", 5)?;
        state.serialize_field("source", self.source.as_str())?;
        state.serialize_field("line", &self.line)?;
        state.serialize_field("column", &self.column)?;
        state.serialize_field("start", &range.start)?;
        state.serialize_field("end", &range.end)?;
        state.end()
    }
}

/// Text of one template source, cheap to clone.
#[derive(Clone)]
pub struct SourceCode {
    name: SourceName,
    code: Arc<String>,
}

impl SourceCode {
    pub fn new(name: impl Into<Arc<str>>, code: String) -> Self {
        Self {
            name: SourceName::new(name),
            code: Arc::new(code),
        }
    }

    pub fn name(&self) -> &SourceName {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Position covering `start..end`, with line and column computed from
    /// the text.
    ///
    /// # Panics
    /// Panics if the range is out of bounds or not on UTF-8 boundaries.
    pub fn position(&self, start: usize, end: usize) -> SourcePosition {
        assert!(start <= end, "start > end");
        assert!(end <= self.code.len(), "end out of bounds");
        assert!(self.code.is_char_boundary(start), "start not on char boundary");

        let before = &self.code[..start];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |index| index + 1);
        let column = before[line_start..].chars().count() + 1;

        SourcePosition::new(
            self.name.clone(),
            line as u32,
            column as u32,
            Span::from(start..end),
        )
    }
}

impl fmt::Debug for SourceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCode")
            .field("name", &self.name)
            .field("len", &self.code.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_line_and_column() {
        let source = SourceCode::new("hello.xtc", "<a>\n  <b/>\n</a>".to_string());
        let position = source.position(6, 10);
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 3);
        assert_eq!(position.range(), 6..10);
        assert_eq!(position.to_string(), "hello.xtc:2:3");
    }

    #[test]
    fn test_position_at_start() {
        let source = SourceCode::new("t", "abc".to_string());
        let position = source.position(0, 0);
        assert_eq!((position.line, position.column), (1, 1));
    }

    #[test]
    fn test_position_serializes_offsets() {
        let source = SourceCode::new("t", "abc\ndef".to_string());
        let json = serde_json::to_value(source.position(4, 7)).unwrap();
        assert_eq!(json["line"], 2);
        assert_eq!(json["start"], 4);
        assert_eq!(json["end"], 7);
    }
}
