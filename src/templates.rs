//! Template Registry - Installed Document Models

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::ENGINE_VERSION;

pub type TemplateId = String;

/// Descriptive metadata for one installed template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub family: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_engine_min_version")]
    pub engine_min_version: String,
}

fn default_true() -> bool { true }
fn default_engine_min_version() -> String { crate::MIN_ENGINE_VERSION.to_string() }

impl TemplateMeta {
    pub fn new(id: impl Into<String>, family: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            family: family.into(),
            enabled: true,
            priority: 0,
            engine_min_version: default_engine_min_version(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// False when the template needs a newer engine or its version is unparseable
    pub fn is_compatible(&self) -> bool {
        let (Ok(engine), Ok(min)) = (
            semver::Version::parse(ENGINE_VERSION),
            semver::Version::parse(&self.engine_min_version),
        ) else {
            warn!(template = %self.id, min = %self.engine_min_version, "invalid engine version");
            return false;
        };
        engine >= min
    }
}

/// Template registry - the enabled-models listing per family
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<TemplateMeta>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: vec![] }
    }

    /// Load every `*.json` descriptor in `dir`; unreadable descriptors are skipped
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::new();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().map_or(false, |e| e == "json") {
                    let parsed = fs::read_to_string(&path)
                        .map_err(|e| e.to_string())
                        .and_then(|c| serde_json::from_str::<TemplateMeta>(&c).map_err(|e| e.to_string()));
                    match parsed {
                        Ok(meta) => registry.register(meta),
                        Err(e) => warn!(path = %path.display(), error = %e, "skipping template descriptor"),
                    }
                }
            }
        }
        debug!(count = registry.templates.len(), "template registry loaded");
        Ok(registry)
    }

    /// Insert, replacing any entry with the same family and id
    pub fn register(&mut self, meta: TemplateMeta) {
        match self
            .templates
            .iter_mut()
            .find(|t| t.family == meta.family && t.id == meta.id)
        {
            Some(existing) => *existing = meta,
            None => self.templates.push(meta),
        }
    }

    pub fn get(&self, family: &str, id: &str) -> Option<&TemplateMeta> {
        self.templates.iter().find(|t| t.family == family && t.id == id)
    }

    /// Enabled, compatible models of `family`, by priority then id
    pub fn list_models(&self, family: &str) -> Vec<(TemplateId, TemplateMeta)> {
        let mut models: Vec<_> = self
            .templates
            .iter()
            .filter(|t| t.family == family && t.enabled && t.is_compatible())
            .collect();
        models.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        models.into_iter().map(|t| (t.id.clone(), t.clone())).collect()
    }

    pub fn list(&self) -> Vec<&TemplateMeta> {
        self.templates.iter().collect()
    }
}
