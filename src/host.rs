//! Host Boundary - Business Objects and Collaborators
//!
//! The ERP owns persistence and rendering. These are the seams the
//! dispatcher and numbering schemes talk through.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Read access to host persistence
pub trait Database: Send + Sync {
    /// Every proposal reference recorded so far that starts with `prefix`
    fn references_with_prefix(&self, prefix: &str) -> Vec<String>;
}

pub type DbHandle = Arc<dyn Database>;

/// Fixed reference list, for tests and the CLI
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    references: Vec<String>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_references<I, S>(references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { references: references.into_iter().map(Into::into).collect() }
    }

    pub fn into_handle(self) -> DbHandle {
        Arc::new(self)
    }
}

impl Database for MemoryDatabase {
    fn references_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.references
            .iter()
            .filter(|r| r.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalLine {
    #[serde(default)]
    pub product_ref: Option<String>,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub qty: f64,
    pub unit_price: f64,
}

impl ProposalLine {
    pub fn total(&self) -> f64 {
        self.qty * self.unit_price
    }
}

/// Sales proposal as handed over by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: u64,
    pub reference: String,
    pub customer: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub lines: Vec<ProposalLine>,
    #[serde(default)]
    pub note_public: Option<String>,
    /// Last error reported while building a document for this proposal
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl Proposal {
    pub fn total(&self) -> f64 {
        self.lines.iter().map(ProposalLine::total).sum()
    }

    /// Trimmed reference when it is usable as a single directory name.
    /// Absolute paths, separators, `.` and `..` give None.
    pub fn storage_name(&self) -> Option<&str> {
        let reference = self.reference.trim();
        if reference.is_empty() || reference.contains(['/', '\\']) {
            return None;
        }
        let mut components = Path::new(reference).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(reference),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub login: String,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self { login: login.into() }
    }
}

/// Deletes stale rendered previews of a proposal
pub trait PreviewCleaner {
    fn delete_previews(&self, proposal: &Proposal);
}

/// Removes `<ref>.pdf.png` and `<ref>.pdf-N.png` under `<output_dir>/<ref>/`
#[derive(Debug, Clone)]
pub struct FsPreviewCleaner {
    output_dir: PathBuf,
}

impl FsPreviewCleaner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    fn is_preview(reference: &str, file_name: &str) -> bool {
        let Some(rest) = file_name.strip_prefix(reference) else {
            return false;
        };
        if rest == ".pdf.png" {
            return true;
        }
        rest.strip_prefix(".pdf-")
            .and_then(|r| r.strip_suffix(".png"))
            .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl PreviewCleaner for FsPreviewCleaner {
    fn delete_previews(&self, proposal: &Proposal) {
        let Some(reference) = proposal.storage_name() else {
            warn!(reference = %proposal.reference, "unsafe reference, previews left alone");
            return;
        };
        let dir = self.output_dir.join(reference);
        let Ok(entries) = fs::read_dir(&dir) else {
            return;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !Self::is_preview(reference, name) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => debug!(file = name, "deleted preview"),
                Err(e) => warn!(file = name, error = %e, "failed to delete preview"),
            }
        }
    }
}
