//! Localization - Message Catalog and Output Language
//!
//! Strings are resolved only for display. Control flow never depends on them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CHARSET: &str = "UTF-8";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Resolves message keys to display text in the active language
pub trait Translator {
    /// Language code of the active catalog, e.g. `en_US`
    fn lang(&self) -> &str;

    /// Translate `key`, substituting each `%s` in order with `args`.
    /// Unknown keys are returned as-is.
    fn trans(&self, key: &str, args: &[&str]) -> String;
}

/// In-memory message catalog keyed by message id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub lang: String,
    #[serde(default)]
    pub messages: HashMap<String, String>,
}

impl Catalog {
    /// en_US catalog with the messages this crate emits
    pub fn builtin() -> Self {
        let messages = [
            ("Error", "Error"),
            ("Error_PROPALE_ADDON_PDF_NotDefined", "Constant PROPALE_ADDON_PDF not defined"),
            ("ErrorFileDoesNotExists", "File %s does not exist"),
            ("NoDescription", "No description"),
            ("NoExample", "No example"),
            ("NotAvailable", "Not available"),
            ("VersionDevelopment", "Development"),
            ("VersionExperimental", "Experimental"),
            ("ProposalNumberingMarbre", "Return number with format %syymm-nnnn where yy is year, mm is month and nnnn is a sequence with no break and no return to 0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self { lang: "en_US".to_string(), messages }
    }

    /// Load a JSON catalog and layer it over the built-in messages
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        let overlay: Catalog = serde_json::from_str(&content)?;
        let mut catalog = Self::builtin();
        catalog.lang = overlay.lang;
        catalog.messages.extend(overlay.messages);
        Ok(catalog)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Translator for Catalog {
    fn lang(&self) -> &str {
        &self.lang
    }

    fn trans(&self, key: &str, args: &[&str]) -> String {
        let Some(template) = self.messages.get(key) else {
            return key.to_string();
        };

        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut rest = template.as_str();
        while let Some(pos) = rest.find("%s") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str("%s"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

/// Language handle used to render a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputLanguage {
    pub code: String,
    pub charset_output: String,
}

impl OutputLanguage {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            charset_output: DEFAULT_CHARSET.to_string(),
        }
    }

    /// Snapshot `charset_output`; the guard puts it back when dropped.
    pub fn charset_scope(&mut self) -> CharsetGuard<'_> {
        let saved = self.charset_output.clone();
        CharsetGuard { langs: self, saved }
    }
}

impl Default for OutputLanguage {
    fn default() -> Self {
        Self::new("en_US")
    }
}

/// Restores the output charset on every exit path, unwinding included
pub struct CharsetGuard<'a> {
    langs: &'a mut OutputLanguage,
    saved: String,
}

impl CharsetGuard<'_> {
    pub fn saved(&self) -> &str {
        &self.saved
    }
}

impl Deref for CharsetGuard<'_> {
    type Target = OutputLanguage;

    fn deref(&self) -> &OutputLanguage {
        &*self.langs
    }
}

impl DerefMut for CharsetGuard<'_> {
    fn deref_mut(&mut self) -> &mut OutputLanguage {
        &mut *self.langs
    }
}

impl Drop for CharsetGuard<'_> {
    fn drop(&mut self) {
        self.langs.charset_output = std::mem::take(&mut self.saved);
    }
}
