//! Translatable messages.
//!
//! A message pattern is text with `%1`..`%9` parameter references and `%%`
//! for a literal percent sign. A `%` followed by anything else is kept as
//! text. Messages are identified by a 64-bit fingerprint of their meaning and
//! pattern.

use chumsky::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

pub const MAX_PARAMETERS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    pub id: u64,
    pub meaning: Option<String>,
    pub comment: Option<String>,
    pub hidden: bool,
    pub pattern: String,
    /// Placeholders in pattern order, for translators.
    pub placeholders: Vec<MessagePlaceholder>,
}

/// A placeholder as translators see it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MessagePlaceholder {
    /// Upper-cased placeholder name.
    pub name: String,
    pub example: String,
    /// The placeholder's piece of the pattern, e.g. `%1`.
    pub presentation: String,
}

impl MessagePlaceholder {
    pub fn new(name: &str, example: impl Into<String>, presentation: impl Into<String>) -> Self {
        Self {
            name: name.to_uppercase(),
            example: example.into(),
            presentation: presentation.into(),
        }
    }
}

impl Message {
    pub fn new(
        meaning: Option<String>,
        comment: Option<String>,
        hidden: bool,
        pattern: impl Into<String>,
    ) -> Self {
        let pattern = pattern.into();
        Self {
            id: fingerprint(meaning.as_deref(), &pattern),
            meaning,
            comment,
            hidden,
            pattern,
            placeholders: Vec::new(),
        }
    }

    /// Placeholders do not take part in the fingerprint.
    pub fn with_placeholders(self, placeholders: Vec<MessagePlaceholder>) -> Self {
        Self {
            placeholders,
            ..self
        }
    }

    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.id.to_be_bytes())
    }

    pub fn template(&self) -> Result<MessageTemplate<'_>, MessageError> {
        MessageTemplate::parse(&self.pattern)
    }
}

/// First 8 bytes of SHA-256 over pattern and meaning, high bit cleared so the
/// id stays positive as a signed 64-bit integer.
pub fn fingerprint(meaning: Option<&str>, pattern: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(pattern.as_bytes());
    if let Some(meaning) = meaning {
        hasher.update([0]);
        hasher.update(meaning.as_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) & (u64::MAX >> 1)
}

/// Escapes static text for use inside a pattern.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if text.contains('%') {
        Cow::Owned(text.replace('%', "%%"))
    } else {
        Cow::Borrowed(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    Malformed { reason: String },
    MissingParameter { index: usize, supplied: usize },
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed message pattern: {reason}"),
            Self::MissingParameter { index, supplied } => write!(
                f,
                "message refers to %{index} but only {supplied} parameters were supplied"
            ),
        }
    }
}

impl std::error::Error for MessageError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'pattern> {
    Text(&'pattern str),
    Percent,
    /// One-based parameter reference.
    Parameter(usize),
}

pub fn pattern_parser<'pattern>()
-> impl Parser<'pattern, &'pattern str, Vec<Piece<'pattern>>, extra::Err<Rich<'pattern, char>>> {
    let percent = just("%%").to(Piece::Percent);

    let parameter = just('%')
        .ignore_then(one_of("123456789"))
        .map(|digit: char| Piece::Parameter(digit as usize - '0' as usize));

    let stray_percent = just('%').to_slice().map(Piece::Text);

    let text = none_of('%')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(Piece::Text);

    choice((percent, parameter, stray_percent, text))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate<'pattern> {
    pieces: Vec<Piece<'pattern>>,
}

impl<'pattern> MessageTemplate<'pattern> {
    pub fn parse(pattern: &'pattern str) -> Result<Self, MessageError> {
        pattern_parser()
            .parse(pattern)
            .into_result()
            .map(|pieces| Self { pieces })
            .map_err(|errors| MessageError::Malformed {
                reason: errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn pieces(&self) -> &[Piece<'pattern>] {
        &self.pieces
    }

    /// Highest parameter index referenced.
    pub fn parameter_count(&self) -> usize {
        self.pieces
            .iter()
            .filter_map(|piece| match piece {
                Piece::Parameter(index) => Some(*index),
                Piece::Text(_) | Piece::Percent => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn expand<S: AsRef<str>>(&self, parameters: &[S]) -> Result<String, MessageError> {
        let mut output = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => output.push_str(text),
                Piece::Percent => output.push('%'),
                Piece::Parameter(index) => {
                    let parameter = parameters.get(index - 1).ok_or(MessageError::MissingParameter {
                        index: *index,
                        supplied: parameters.len(),
                    })?;
                    output.push_str(parameter.as_ref());
                }
            }
        }
        Ok(output)
    }
}
