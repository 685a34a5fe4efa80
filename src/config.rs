//! Configuration file support.
//!
//! A config file declares shared CTEs plus CLI defaults:
//!
//! ```toml
//! recursive = false
//!
//! [log]
//! level = "debug"
//!
//! [output]
//! format = "json"
//!
//! [[cte]]
//! name = "active_users"
//! sql = "SELECT * FROM users WHERE active = true"
//!
//! [[cte]]
//! definition = "recent_posts AS (SELECT * FROM posts ORDER BY created_at DESC LIMIT 10)"
//! ```
//!
//! Lookup order: an explicit path, `qail-cte.toml` in the working
//! directory, then `<config dir>/qail-cte/config.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CteError, CteResult};
use crate::registry::{CteRegistry, WithArg};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "qail-cte.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CteConfig {
    /// Render `WITH RECURSIVE` for the configured CTEs.
    pub recursive: bool,
    pub log: LogConfig,
    pub output: OutputConfig,
    #[serde(rename = "cte")]
    pub ctes: Vec<CteEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `"warn"` or `"qail_cte=debug"`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One `[[cte]]` table: either `name` + `sql`, or a full `definition`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CteEntry {
    pub name: Option<String>,
    pub sql: Option<String>,
    pub definition: Option<String>,
}

impl CteEntry {
    fn to_arg(&self, index: usize) -> CteResult<WithArg> {
        match (&self.name, &self.sql, &self.definition) {
            (Some(name), Some(sql), None) => {
                Ok(WithArg::map([(name.clone(), sql.clone())]))
            }
            (None, None, Some(definition)) => Ok(WithArg::Sql(definition.clone())),
            _ => Err(CteError::config(format!(
                "cte #{} must set either `name` and `sql`, or `definition`",
                index + 1
            ))),
        }
    }
}

impl CteConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(content: &str) -> CteResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a config file.
    pub fn from_file(path: impl AsRef<Path>) -> CteResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(
            "Loaded {} CTE(s) from {}",
            config.ctes.len(),
            path.display()
        );
        Ok(config)
    }

    /// Load from `explicit` if given, else the first default location that
    /// exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> CteResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Attach the configured CTEs, in file order, to a fresh registry.
    pub fn registry(&self) -> CteResult<CteRegistry> {
        if self.ctes.is_empty() {
            return Ok(CteRegistry::new());
        }

        let args = self
            .ctes
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.to_arg(i))
            .collect::<CteResult<Vec<_>>>()?;
        CteRegistry::new().attach(args, self.recursive)
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("qail-cte").join("config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CteConfig::from_toml("").unwrap();
        assert_eq!(config, CteConfig::default());
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.registry().unwrap().is_empty());
    }

    #[test]
    fn test_registry_from_entries() {
        let config = CteConfig::from_toml(
            r#"
            recursive = true

            [output]
            format = "json"

            [[cte]]
            name = "active_users"
            sql = "SELECT * FROM users WHERE active = true"

            [[cte]]
            definition = "recent AS (SELECT * FROM posts LIMIT 10)"
            "#,
        )
        .unwrap();

        assert_eq!(config.output.format, OutputFormat::Json);
        let ctes = config.registry().unwrap();
        assert!(ctes.is_recursive());
        assert_eq!(ctes.names(), vec!["active_users", "recent"]);
    }

    #[test]
    fn test_entry_needs_one_shape() {
        let config = CteConfig::from_toml(
            r#"
            [[cte]]
            name = "half"
            "#,
        )
        .unwrap();
        let err = config.registry().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: cte #1 must set either `name` and `sql`, or `definition`"
        );
    }

    #[test]
    fn test_bad_definition_surfaces_parse_error() {
        let config = CteConfig::from_toml(
            r#"
            [[cte]]
            definition = "broken (SELECT 1)"
            "#,
        )
        .unwrap();
        assert!(config.registry().unwrap_err().is_parse_error());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            CteConfig::from_toml("recursve = true").unwrap_err(),
            CteError::Toml(_)
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = CteConfig::load(Some(Path::new("/nonexistent/qail-cte.toml"))).unwrap_err();
        assert!(matches!(err, CteError::Io(_)));
    }
}
