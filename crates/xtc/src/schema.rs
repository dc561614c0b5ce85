//! Schemas: output content types and how they relate.
//!
//! A `Schema` describes one kind of output content (HTML, plaintext, ...),
//! its family, the runtime appender that escapes dynamic values into it and
//! the target-language type of closures producing it. Schemas come from
//! declarative definitions. The compiler only asks two questions of them:
//! "does A allow B" and "how is static text of A escaped".

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFamily {
    Markup,
    Css,
    JavaScript,
    Plaintext,
}

/// Declarative description of a schema, as found in definition files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: String,
    pub content_type: String,
    #[serde(default)]
    pub canonical_content_type: Option<String>,
    pub family: ContentFamily,
    pub target_type: String,
    pub appender: String,
    /// Content types this schema accepts besides itself.
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Content type of translatable messages embedded in this schema.
    #[serde(default)]
    pub message_content_type: Option<String>,
    #[serde(default)]
    pub tag_prefix: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Schema(Arc<SchemaDef>);

impl Schema {
    pub fn new(def: SchemaDef) -> Self {
        Schema(Arc::new(def))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn content_type(&self) -> &str {
        &self.0.content_type
    }

    pub fn canonical_content_type(&self) -> &str {
        self.0
            .canonical_content_type
            .as_deref()
            .unwrap_or(&self.0.content_type)
    }

    pub fn family(&self) -> ContentFamily {
        self.0.family
    }

    pub fn target_type(&self) -> &str {
        &self.0.target_type
    }

    pub fn appender(&self) -> &str {
        &self.0.appender
    }

    pub fn message_content_type(&self) -> Option<&str> {
        self.0.message_content_type.as_deref()
    }

    pub fn is_translatable(&self) -> bool {
        self.0.message_content_type.is_some()
    }

    pub fn def(&self) -> &SchemaDef {
        &self.0
    }

    /// Whether content of `other` may appear where `self` is expected.
    ///
    /// Not symmetric: `self` lists what it accepts, `other` has no say.
    pub fn allows(&self, other: &Schema) -> bool {
        self == other
            || self
                .0
                .allowed
                .iter()
                .any(|content_type| content_type == other.canonical_content_type())
    }

    /// Escapes static template text for this schema.
    ///
    /// Only markup needs static escaping. Dynamic values are escaped at
    /// runtime by the schema's appender.
    pub fn escape_static<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self.0.family {
            ContentFamily::Markup => escape_markup(text),
            ContentFamily::Css | ContentFamily::JavaScript | ContentFamily::Plaintext => {
                Cow::Borrowed(text)
            }
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({})", self.0.content_type)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_content_type())
    }
}

fn escape_markup(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Schema attached to an expression.
///
/// `Untyped` means the schema is not known yet (before binding).
/// `Opaque` means the value is typed by the output language itself, as
/// with native code or boolean constants. They are never interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SchemaTag {
    #[default]
    Untyped,
    Opaque,
    Known(Schema),
}

impl SchemaTag {
    pub fn known(&self) -> Option<&Schema> {
        match self {
            Self::Known(schema) => Some(schema),
            Self::Untyped | Self::Opaque => None,
        }
    }

    /// Whether an expression tagged with `self` may appear in `context`.
    /// Only known schemas are checked.
    pub fn allowed_by(&self, context: &Schema) -> bool {
        match self {
            Self::Known(schema) => context.allows(schema),
            Self::Untyped | Self::Opaque => true,
        }
    }
}

impl From<Schema> for SchemaTag {
    fn from(schema: Schema) -> Self {
        Self::Known(schema)
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untyped => f.write_str("untyped"),
            Self::Opaque => f.write_str("native"),
            Self::Known(schema) => write!(f, "{schema}"),
        }
    }
}

/// Lookup of schemas by content type.
pub trait SchemaRegistry {
    fn from_content_type(&self, content_type: &str) -> Option<Schema>;

    /// Schema of translatable messages embedded in `schema`.
    fn message_schema(&self, schema: &Schema) -> Option<Schema> {
        schema
            .message_content_type()
            .and_then(|content_type| self.from_content_type(content_type))
    }
}

/// Schemas loaded from definitions, keyed by content type.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: IndexMap<String, Schema>,
}

#[derive(Deserialize)]
struct SchemaFile {
    #[serde(default)]
    schema: Vec<SchemaDef>,
}

impl SchemaSet {
    pub fn from_defs(defs: impl IntoIterator<Item = SchemaDef>) -> Self {
        let mut set = Self::default();
        for def in defs {
            set.insert(Schema::new(def));
        }
        set
    }

    /// Definitions as a JSON array.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let defs: Vec<SchemaDef> = serde_json::from_str(json)?;
        Ok(Self::from_defs(defs))
    }

    /// Definitions as `[[schema]]` TOML tables.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: SchemaFile = toml::from_str(content)?;
        Ok(Self::from_defs(file.schema))
    }

    pub fn builtin() -> Self {
        Self::from_defs(builtin_defs())
    }

    pub fn insert(&mut self, schema: Schema) {
        if let Some(canonical) = schema.0.canonical_content_type.clone() {
            self.schemas.insert(canonical, schema.clone());
        }
        self.schemas
            .insert(schema.content_type().to_string(), schema);
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaRegistry for SchemaSet {
    fn from_content_type(&self, content_type: &str) -> Option<Schema> {
        self.schemas.get(content_type).cloned()
    }
}

fn builtin_defs() -> Vec<SchemaDef> {
    let def = |name: &str,
               content_type: &str,
               family: ContentFamily,
               target_type: &str,
               appender: &str,
               allowed: &[&str],
               message_content_type: Option<&str>| SchemaDef {
        name: name.to_string(),
        content_type: content_type.to_string(),
        canonical_content_type: None,
        family,
        target_type: target_type.to_string(),
        appender: appender.to_string(),
        allowed: allowed.iter().map(|allowed| allowed.to_string()).collect(),
        message_content_type: message_content_type.map(str::to_string),
        tag_prefix: None,
    };
    vec![
        def(
            "html",
            "text/html",
            ContentFamily::Markup,
            "HtmlClosure",
            "HtmlAppender",
            &["application/xhtml+xml"],
            Some("text/html"),
        ),
        def(
            "xhtml",
            "application/xhtml+xml",
            ContentFamily::Markup,
            "HtmlClosure",
            "HtmlAppender",
            &[],
            Some("application/xhtml+xml"),
        ),
        def(
            "plaintext",
            "text/plain",
            ContentFamily::Plaintext,
            "PlaintextClosure",
            "PlaintextAppender",
            &[],
            Some("text/plain"),
        ),
        def(
            "css",
            "text/css",
            ContentFamily::Css,
            "CssClosure",
            "CssAppender",
            &[],
            None,
        ),
        def(
            "javascript",
            "text/javascript",
            ContentFamily::JavaScript,
            "JavascriptClosure",
            "JavascriptAppender",
            &[],
            Some("text/plain"),
        ),
    ]
}
