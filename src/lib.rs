//! Propal Docgen - Proposal Document Generation Dispatch
//!
//! # Resolution Contract
//! 1. A requested template wins when its unit file exists
//! 2. Otherwise the configured default (`PROPALE_ADDON_PDF`)
//! 3. Otherwise the built-in `azur`
//! 4. Otherwise the first enabled model of the family
//!
//! A loaded unit that fails is not retried. Trigger failures after a
//! successful write are reported alongside the document, never instead of it.

pub mod config;
pub mod hashing;
pub mod host;
pub mod i18n;
pub mod numbering;
pub mod pipeline;
pub mod templates;
pub mod triggers;
pub mod units;

pub use config::DocgenConfig;
pub use host::{Database, DbHandle, FsPreviewCleaner, MemoryDatabase, PreviewCleaner, Proposal, ProposalLine, User};
pub use i18n::{Catalog, OutputLanguage, Translator};
pub use numbering::{MarbreScheme, NumberingScheme, SchemeStability};
pub use pipeline::{
    DispatchContext, DispatchError, DocumentDispatcher, GenerationOutcome, GenerationRequest, Resolution,
    ResolutionSource,
};
pub use templates::{TemplateId, TemplateMeta, TemplateRegistry};
pub use triggers::{TriggerBus, TriggerDispatcher, TriggerError, TriggerEvent, TriggerListener};
pub use units::{TemplateUnit, UnitCatalog, UnitError, WriteRequest};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_ENGINE_VERSION: &str = "1.0.0";
