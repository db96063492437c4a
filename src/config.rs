//! Configuration - Explicit Dispatch Settings
//!
//! Read from an optional JSON file, then environment overrides.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Env var holding the default proposal template identifier
pub const ENV_DEFAULT_TEMPLATE: &str = "PROPALE_ADDON_PDF";
pub const ENV_TEMPLATE_ROOT: &str = "DOCGEN_TEMPLATE_ROOT";
pub const ENV_OUTPUT_DIR: &str = "DOCGEN_OUTPUT_DIR";

pub const PROPAL_FAMILY: &str = "propale";
pub const UNIT_EXTENSION: &str = "unit";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocgenConfig {
    /// Default template identifier; empty means unset
    #[serde(default)]
    pub default_template: Option<String>,
    #[serde(default = "default_template_root")]
    pub template_root: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default = "default_unit_extension")]
    pub unit_extension: String,
}

fn default_template_root() -> PathBuf { PathBuf::from("templates") }
fn default_output_dir() -> PathBuf { PathBuf::from("documents") }
fn default_family() -> String { PROPAL_FAMILY.to_string() }
fn default_unit_extension() -> String { UNIT_EXTENSION.to_string() }

impl Default for DocgenConfig {
    fn default() -> Self {
        Self {
            default_template: None,
            template_root: default_template_root(),
            output_dir: default_output_dir(),
            family: default_family(),
            unit_extension: default_unit_extension(),
        }
    }
}

impl DocgenConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File (if given) then environment overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|key| env::var(key).ok()))
    }

    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(ENV_DEFAULT_TEMPLATE) {
            self.default_template = Some(v);
        }
        if let Some(v) = lookup(ENV_TEMPLATE_ROOT) {
            self.template_root = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(v);
        }
        self
    }

    /// Configured default, with empty and whitespace-only values treated as unset
    pub fn default_template(&self) -> Option<&str> {
        self.default_template
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `<root>/<family>/pdf_<family>_<id>.<ext>`
    pub fn unit_path(&self, template_id: &str) -> PathBuf {
        self.template_root
            .join(&self.family)
            .join(format!("pdf_{}_{}.{}", self.family, template_id, self.unit_extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_path_layout() {
        let config = DocgenConfig {
            template_root: PathBuf::from("/srv/templates"),
            ..Default::default()
        };
        assert_eq!(
            config.unit_path("azur"),
            PathBuf::from("/srv/templates/propale/pdf_propale_azur.unit")
        );
    }

    #[test]
    fn test_empty_default_is_unset() {
        let config = DocgenConfig {
            default_template: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.default_template(), None);
    }

    #[test]
    fn test_env_overrides() {
        let config = DocgenConfig::default().with_env_overrides(|key| match key {
            ENV_DEFAULT_TEMPLATE => Some("cyan".to_string()),
            ENV_OUTPUT_DIR => Some("/var/docs".to_string()),
            _ => None,
        });
        assert_eq!(config.default_template(), Some("cyan"));
        assert_eq!(config.output_dir, PathBuf::from("/var/docs"));
        assert_eq!(config.template_root, PathBuf::from("templates"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docgen.json");
        fs::write(&path, r#"{"defaultTemplate": "azur", "templateRoot": "/opt/t"}"#).unwrap();

        let config = DocgenConfig::load(&path).unwrap();
        assert_eq!(config.default_template(), Some("azur"));
        assert_eq!(config.template_root, PathBuf::from("/opt/t"));
        assert_eq!(config.family, PROPAL_FAMILY);
        assert_eq!(config.unit_extension, UNIT_EXTENSION);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docgen.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(DocgenConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
