//! Generation Pipeline - Single Entry Point
//!
//! Resolution order: requested template, configured default, built-in
//! `azur`, then the first enabled model of the family. Once a unit is
//! loaded its failure is final.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DocgenConfig;
use crate::host::{DbHandle, PreviewCleaner, Proposal, User};
use crate::i18n::{OutputLanguage, Translator};
use crate::templates::{TemplateId, TemplateMeta, TemplateRegistry};
use crate::triggers::{TriggerBus, TriggerEvent, PROPAL_BUILDDOC};
use crate::units::{UnitCatalog, WriteRequest};

/// Used when neither a template nor a configured default is given
pub const FALLBACK_TEMPLATE: &str = "azur";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No default template configured and no template available")]
    ConfigurationMissing { attempted: Vec<PathBuf> },

    #[error("Template file {} does not exist", .path.display())]
    TemplateFileNotFound { path: PathBuf },

    #[error("Template '{0}' has no registered unit")]
    UnitNotRegistered(TemplateId),

    #[error("Generation failed with template '{template}': {message}")]
    GenerationFailed { template: TemplateId, message: String },
}

impl DispatchError {
    /// Page message for the host to display
    pub fn user_message(&self, tr: &dyn Translator) -> String {
        let detail = match self {
            Self::ConfigurationMissing { .. } => tr.trans("Error_PROPALE_ADDON_PDF_NotDefined", &[]),
            Self::TemplateFileNotFound { path } => {
                let path = path.display().to_string();
                tr.trans("ErrorFileDoesNotExists", &[path.as_str()])
            }
            Self::UnitNotRegistered(_) | Self::GenerationFailed { .. } => self.to_string(),
        };
        format!("{} {}", tr.trans("Error", &[]), detail)
    }
}

/// Where the resolved identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Requested,
    ConfiguredDefault,
    BuiltinFallback,
    Registry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub template_id: TemplateId,
    pub unit_path: PathBuf,
    pub source: ResolutionSource,
}

/// Per-call options; an empty `template` means "use the default"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub src_template_path: Option<PathBuf>,
    #[serde(default)]
    pub hide_details: bool,
    #[serde(default)]
    pub hide_description: bool,
    #[serde(default)]
    pub hide_reference: bool,
}

impl GenerationRequest {
    pub fn with_template(template: impl Into<String>) -> Self {
        Self { template: template.into(), ..Default::default() }
    }
}

/// A document was produced. Trigger failures are carried, not raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub template_id: TemplateId,
    pub source: ResolutionSource,
    pub document: PathBuf,
    pub event_id: Uuid,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub trigger_errors: Vec<String>,
}

impl GenerationOutcome {
    pub fn triggers_ok(&self) -> bool {
        self.trigger_errors.is_empty()
    }
}

/// Explicit per-request context: no process-wide globals
pub struct DispatchContext<'a> {
    pub config: &'a DocgenConfig,
    pub db: DbHandle,
    pub user: &'a User,
    pub translator: &'a dyn Translator,
}

/// The dispatcher - single entry point for proposal document generation
pub struct DocumentDispatcher {
    registry: TemplateRegistry,
    units: UnitCatalog,
    previews: Box<dyn PreviewCleaner>,
    triggers: Box<dyn TriggerBus>,
}

impl DocumentDispatcher {
    pub fn new(
        registry: TemplateRegistry,
        units: UnitCatalog,
        previews: Box<dyn PreviewCleaner>,
        triggers: Box<dyn TriggerBus>,
    ) -> Self {
        Self { registry, units, previews, triggers }
    }

    /// Enabled models of `family`, in fallback order
    pub fn list_models(&self, family: &str) -> Vec<(TemplateId, TemplateMeta)> {
        self.registry.list_models(family)
    }

    /// Pick the template to use. Never checks a path built from an empty id.
    ///
    /// With a configured default, failure is `TemplateFileNotFound` naming
    /// the last path checked: the registry's first entry when there is one,
    /// otherwise the configured default's path. Without one, failure is
    /// `ConfigurationMissing` listing every path checked.
    pub fn resolve_template(
        &self,
        config: &DocgenConfig,
        requested: &str,
    ) -> Result<Resolution, DispatchError> {
        let requested = requested.trim();
        let configured = config.default_template();
        let mut attempted = vec![];

        let (first, source) = match (requested.is_empty(), configured) {
            (false, _) => (requested, ResolutionSource::Requested),
            (true, Some(c)) => (c, ResolutionSource::ConfiguredDefault),
            (true, None) => (FALLBACK_TEMPLATE, ResolutionSource::BuiltinFallback),
        };
        if let Some(r) = check_unit(config, first, source, &mut attempted) {
            return Ok(r);
        }

        if let Some(c) = configured.filter(|c| *c != first) {
            if let Some(r) = check_unit(config, c, ResolutionSource::ConfiguredDefault, &mut attempted) {
                return Ok(r);
            }
        }

        let models = self.registry.list_models(&config.family);
        if let Some((id, _)) = models.first() {
            if let Some(r) = check_unit(config, id, ResolutionSource::Registry, &mut attempted) {
                return Ok(r);
            }
        }

        match (configured, attempted.last()) {
            (Some(_), Some(path)) => Err(DispatchError::TemplateFileNotFound { path: path.clone() }),
            _ => Err(DispatchError::ConfigurationMissing { attempted }),
        }
    }

    /// Resolve, write, then clean previews and fire `PROPAL_BUILDDOC`.
    ///
    /// `outputlangs.charset_output` is the same on return as on entry,
    /// whatever the unit did with it.
    pub fn generate(
        &self,
        ctx: &DispatchContext<'_>,
        proposal: &mut Proposal,
        request: &GenerationRequest,
        outputlangs: &mut OutputLanguage,
    ) -> Result<GenerationOutcome, DispatchError> {
        let resolution = self.resolve_template(ctx.config, &request.template)?;
        let factory = self
            .units
            .get(&resolution.template_id)
            .ok_or_else(|| DispatchError::UnitNotRegistered(resolution.template_id.clone()))?;

        let mut unit = factory(ctx.db.clone());
        let written = {
            let mut langs = outputlangs.charset_scope();
            let write = WriteRequest {
                proposal: &*proposal,
                output_dir: &ctx.config.output_dir,
                src_template_path: request.src_template_path.as_deref(),
                hide_details: request.hide_details,
                hide_description: request.hide_description,
                hide_reference: request.hide_reference,
            };
            unit.write_file(&write, &mut *langs)
        };

        let document = match written {
            Ok(path) => path,
            Err(e) => {
                let message = e.to_string();
                error!(
                    template = %resolution.template_id,
                    proposal = %proposal.reference,
                    error = %message,
                    "document generation failed"
                );
                proposal.last_error = Some(message.clone());
                return Err(DispatchError::GenerationFailed {
                    template: resolution.template_id,
                    message,
                });
            }
        };

        self.previews.delete_previews(proposal);

        let event = TriggerEvent::new(
            PROPAL_BUILDDOC,
            proposal,
            ctx.user,
            ctx.translator.lang(),
            ctx.config,
        );
        let trigger_errors = match self.triggers.run_triggers(&event) {
            Ok(()) => vec![],
            Err(e) => {
                warn!(event = PROPAL_BUILDDOC, errors = e.errors.len(), "document built but triggers failed");
                e.errors
            }
        };

        info!(
            template = %resolution.template_id,
            proposal = %proposal.reference,
            document = %document.display(),
            "document generated"
        );

        Ok(GenerationOutcome {
            template_id: resolution.template_id,
            source: resolution.source,
            document,
            event_id: event.id,
            generated_at: event.fired_at,
            trigger_errors,
        })
    }
}

fn check_unit(
    config: &DocgenConfig,
    id: &str,
    source: ResolutionSource,
    attempted: &mut Vec<PathBuf>,
) -> Option<Resolution> {
    if id.is_empty() {
        debug!(?source, "empty template id, skipping");
        return None;
    }

    let path = config.unit_path(id);
    let found = is_unit_file(&path);
    debug!(template = id, ?source, path = %path.display(), found, "probing template unit");
    attempted.push(path.clone());

    found.then(|| Resolution {
        template_id: id.to_string(),
        unit_path: path,
        source,
    })
}

fn is_unit_file(path: &Path) -> bool {
    path.is_file()
}
