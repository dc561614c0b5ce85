//! Code generation support shared by backends.

pub mod java;

pub use java::JavaCodeGenerator;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputLanguage {
    Java,
    JavaScript,
}

impl fmt::Display for OutputLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Java => "Java",
            Self::JavaScript => "JavaScript",
        })
    }
}

/// Append-only source buffer with indentation.
#[derive(Debug, Clone, Default)]
pub struct CodeWriter {
    buffer: String,
    indent: usize,
}

const INDENT: &str = "  ";

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` as one or more lines at the current indentation.
    /// Every line of a multi-line `text` is indented.
    pub fn line(&mut self, text: impl AsRef<str>) {
        for line in text.as_ref().split('\n') {
            if !line.is_empty() {
                for _ in 0..self.indent {
                    self.buffer.push_str(INDENT);
                }
                self.buffer.push_str(line);
            }
            self.buffer.push('\n');
        }
    }

    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
    }

    /// Writes `text` and indents what follows, e.g. `if (x) {`.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedents and writes `text`, e.g. `}`.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self
            .indent
            .checked_sub(1)
            .unwrap_or_else(|| panic!("unbalanced close: {}", text.as_ref()));
        self.line(text);
    }

    /// Dedents, writes `text` and indents again, e.g. `} else {`.
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.close(text);
        self.indent += 1;
    }

    pub fn indent_level(&self) -> usize {
        self.indent
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Names for generated temporaries: `{prefix}{token}${n}`.
///
/// One counter per compilation unit. Closures nested in the unit share it,
/// so no two temporaries of a unit get the same name.
#[derive(Debug, Clone)]
pub struct VarNames {
    prefix: String,
    counter: usize,
}

impl VarNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }

    pub fn fresh(&mut self, token: &str) -> String {
        self.counter += 1;
        format!("{}{token}${}", self.prefix, self.counter)
    }

    pub fn count(&self) -> usize {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_indents_nested_blocks() {
        let mut writer = CodeWriter::new();
        writer.open("if (a) {");
        writer.line("x();");
        writer.reopen("} else {");
        writer.line("y();");
        writer.close("}");
        assert_eq!(writer.finish(), "if (a) {\n  x();\n} else {\n  y();\n}\n");
    }

    #[test]
    fn test_writer_indents_every_line_of_multiline_text() {
        let mut writer = CodeWriter::new();
        writer.open("{");
        writer.line("f(new A() {\n  body();\n});");
        writer.close("}");
        assert_eq!(writer.finish(), "{\n  f(new A() {\n    body();\n  });\n}\n");
    }

    #[test]
    #[should_panic(expected = "unbalanced close")]
    fn test_unbalanced_close_panics() {
        CodeWriter::new().close("}");
    }

    #[test]
    fn test_var_names_are_unique() {
        let mut names = VarNames::new("xtc$");
        assert_eq!(names.fresh("bool"), "xtc$bool$1");
        assert_eq!(names.fresh("bool"), "xtc$bool$2");
        assert_eq!(names.fresh("iter"), "xtc$iter$3");
    }
}
