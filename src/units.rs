//! Template Units - Document Writers Resolved by Identifier

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::hashing::{canonical_json, document_digest};
use crate::host::{DbHandle, Proposal};
use crate::i18n::{OutputLanguage, DEFAULT_CHARSET};
use crate::templates::TemplateId;

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Cannot write document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Everything a unit needs to write one document
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub proposal: &'a Proposal,
    pub output_dir: &'a Path,
    /// Overrides the unit's own source template, when set
    pub src_template_path: Option<&'a Path>,
    pub hide_details: bool,
    pub hide_description: bool,
    pub hide_reference: bool,
}

/// A loaded template: writes the document for one proposal.
///
/// `write_file` may change `langs.charset_output` when its format cannot
/// carry the requested charset. Callers restore it.
pub trait TemplateUnit {
    fn write_file(
        &mut self,
        request: &WriteRequest<'_>,
        langs: &mut OutputLanguage,
    ) -> Result<PathBuf, UnitError>;
}

pub type UnitFactory = fn(DbHandle) -> Box<dyn TemplateUnit>;

/// Identifier to constructor map, filled at startup
#[derive(Clone, Default)]
pub struct UnitCatalog {
    factories: HashMap<TemplateId, UnitFactory>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register("azur", SummaryUnit::factory);
        catalog
    }

    pub fn register(&mut self, id: impl Into<TemplateId>, factory: UnitFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn get(&self, id: &str) -> Option<UnitFactory> {
        self.factories.get(id).copied()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a str>,
    customer: &'a str,
    date: String,
    lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<Vec<SummaryLine<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    total: f64,
    generated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    product_ref: Option<&'a str>,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    qty: f64,
    unit_price: f64,
    total: f64,
}

/// Built-in `azur` unit: canonical JSON summary plus a `.sha256` digest
pub struct SummaryUnit;

impl SummaryUnit {
    pub fn factory(_db: DbHandle) -> Box<dyn TemplateUnit> {
        Box::new(SummaryUnit)
    }

    fn build<'a>(request: &WriteRequest<'a>, lang: &'a str) -> SummaryDocument<'a> {
        let proposal = request.proposal;
        let lines = (!request.hide_details).then(|| {
            proposal
                .lines
                .iter()
                .map(|l| SummaryLine {
                    product_ref: l.product_ref.as_deref(),
                    label: &l.label,
                    description: if request.hide_description { None } else { l.description.as_deref() },
                    qty: l.qty,
                    unit_price: l.unit_price,
                    total: l.total(),
                })
                .collect()
        });

        SummaryDocument {
            reference: (!request.hide_reference).then_some(proposal.reference.as_str()),
            customer: &proposal.customer,
            date: proposal.date.format("%Y-%m-%d").to_string(),
            lang,
            source_template: request.src_template_path.map(|p| p.display().to_string()),
            lines,
            note: proposal.note_public.as_deref(),
            total: proposal.total(),
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}

impl TemplateUnit for SummaryUnit {
    fn write_file(
        &mut self,
        request: &WriteRequest<'_>,
        langs: &mut OutputLanguage,
    ) -> Result<PathBuf, UnitError> {
        let Some(reference) = request.proposal.storage_name() else {
            return Err(UnitError::Rejected(format!(
                "Proposal reference '{}' is not a valid file name",
                request.proposal.reference
            )));
        };

        // JSON output is UTF-8 only
        langs.charset_output = DEFAULT_CHARSET.to_string();

        let document = Self::build(request, &langs.code);
        let body = canonical_json(&document)?;
        let digest = document_digest(&document)?;

        let dir = request.output_dir.join(reference);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", reference));
        fs::write(&path, body)?;
        fs::write(dir.join(format!("{}.json.sha256", reference)), &digest)?;

        debug!(path = %path.display(), digest = %digest, "summary written");
        Ok(path)
    }
}
