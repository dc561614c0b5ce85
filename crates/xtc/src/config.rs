//! Compiler configuration (TOML).

use crate::alert::AlertPolicy;
use crate::schema::{Schema, SchemaDef, SchemaSet};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub java: JavaConfig,

    #[serde(default)]
    pub codegen: CodegenConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub schemas: SchemasConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JavaConfig {
    /// Package of generated classes when the template name has none
    #[serde(default)]
    pub package: Option<String>,

    /// Package of the runtime support classes (closures, appenders)
    #[serde(default = "default_runtime_package")]
    pub runtime_package: String,
}

impl Default for JavaConfig {
    fn default() -> Self {
        Self {
            package: None,
            runtime_package: default_runtime_package(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodegenConfig {
    /// Prefix of generated temporaries, chosen to be illegal in template
    /// variable names
    #[serde(default = "default_var_prefix")]
    pub var_prefix: String,

    /// Runtime name of the message bundle of generated classes
    #[serde(default)]
    pub message_source: Option<String>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            var_prefix: default_var_prefix(),
            message_source: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub warnings_as_errors: bool,

    /// Alert kind names to drop, e.g. "placeholder-requires-example"
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemasConfig {
    /// JSON file with extra schema definitions, added to the built-in ones
    #[serde(default)]
    pub definitions: Option<PathBuf>,
}

fn default_runtime_package() -> String {
    "xtc.runtime".to_string()
}

fn default_var_prefix() -> String {
    "xtc$".to_string()
}

impl CompilerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format")
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            warnings_as_errors: self.alerts.warnings_as_errors,
            ignore: self.alerts.ignore.clone(),
        }
    }

    /// Built-in schemas plus the configured definitions. Relative paths are
    /// resolved against `base_dir`.
    pub fn load_schemas(&self, base_dir: &Path) -> Result<SchemaSet> {
        let mut schemas = SchemaSet::builtin();
        if let Some(definitions) = &self.schemas.definitions {
            let path = base_dir.join(definitions);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let defs: Vec<SchemaDef> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid schema definitions in {}", path.display()))?;
            log::debug!("loaded {} schema definitions from {}", defs.len(), path.display());
            for def in defs {
                schemas.insert(Schema::new(def));
            }
        }
        Ok(schemas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::from_str("").unwrap();
        assert_eq!(config.java.runtime_package, "xtc.runtime");
        assert_eq!(config.codegen.var_prefix, "xtc$");
        assert!(config.codegen.message_source.is_none());
        assert!(!config.alerts.warnings_as_errors);
        assert!(config.schemas.definitions.is_none());
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
[java]
package = "com.example.templates"
runtime_package = "com.example.runtime"

[codegen]
var_prefix = "gen$"
message_source = "com.example.Messages"

[alerts]
warnings_as_errors = true
ignore = ["empty-placeholder"]
"#;
        let config = CompilerConfig::from_str(toml).unwrap();
        assert_eq!(config.java.package.as_deref(), Some("com.example.templates"));
        assert_eq!(config.codegen.var_prefix, "gen$");
        let policy = config.alert_policy();
        assert!(policy.warnings_as_errors);
        assert_eq!(policy.ignore, ["empty-placeholder"]);
    }

    #[test]
    fn test_invalid_toml() {
        let error = CompilerConfig::from_str("[alerts\nignore = 1").unwrap_err();
        assert!(error.to_string().contains("Invalid TOML format"));
    }

    #[test]
    fn test_missing_file() {
        let error = CompilerConfig::from_file(Path::new("/nonexistent/xtc.toml")).unwrap_err();
        assert!(error.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_schemas_adds_definitions() {
        let dir = std::env::temp_dir().join(format!("xtc-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("schemas.json"),
            r#"[{
                "name": "svg",
                "content_type": "image/svg+xml",
                "family": "markup",
                "target_type": "SvgClosure",
                "appender": "SvgAppender"
            }]"#,
        )
        .unwrap();
        let config = CompilerConfig::from_str("[schemas]\ndefinitions = \"schemas.json\"").unwrap();
        let schemas = config.load_schemas(&dir).unwrap();
        assert!(schemas.from_content_type("image/svg+xml").is_some());
        assert!(schemas.from_content_type("text/html").is_some());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
