//! Numbering Schemes - Proposal Reference Generators
//!
//! Every method has a default so a scheme only overrides what it actually
//! implements. `next_value` is the one a real scheme must provide.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::host::{Database, Proposal};
use crate::i18n::Translator;
use crate::ENGINE_VERSION;

/// Maturity of a numbering scheme, shown in the admin listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeStability {
    Development,
    Experimental,
    /// Ships with the engine; reported as the engine release
    Stable,
    #[default]
    Unset,
}

pub trait NumberingScheme {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn info(&self, tr: &dyn Translator) -> String {
        tr.trans("NoDescription", &[])
    }

    fn example(&self, tr: &dyn Translator) -> String {
        tr.trans("NoExample", &[])
    }

    /// False when references already recorded would clash with this scheme
    fn can_be_activated(&self, _db: &dyn Database) -> bool {
        true
    }

    fn next_value(&self, _db: &dyn Database, _proposal: &Proposal, tr: &dyn Translator) -> String {
        tr.trans("NotAvailable", &[])
    }

    fn stability(&self) -> SchemeStability {
        SchemeStability::Unset
    }

    fn version(&self, tr: &dyn Translator) -> String {
        match self.stability() {
            SchemeStability::Development => tr.trans("VersionDevelopment", &[]),
            SchemeStability::Experimental => tr.trans("VersionExperimental", &[]),
            SchemeStability::Stable => ENGINE_VERSION.to_string(),
            SchemeStability::Unset => tr.trans("NotAvailable", &[]),
        }
    }
}

/// `PRyymm-nnnn`: one sequence across all months, never reset
#[derive(Debug, Clone)]
pub struct MarbreScheme {
    prefix: String,
}

impl MarbreScheme {
    pub fn new() -> Self {
        Self { prefix: "PR".to_string() }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Sequence part of a reference shaped `<prefix>yymm-<suffix>`, or None
    /// when the reference does not have that shape at all.
    fn split<'a>(&self, reference: &'a str) -> Option<&'a str> {
        let rest = reference.strip_prefix(&self.prefix)?;
        let (period, suffix) = rest.split_once('-')?;
        (period.len() == 4 && period.bytes().all(|b| b.is_ascii_digit())).then_some(suffix)
    }

    fn max_sequence(&self, db: &dyn Database) -> u32 {
        db.references_with_prefix(&self.prefix)
            .iter()
            .filter_map(|r| self.split(r))
            .filter_map(|s| s.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
    }
}

impl Default for MarbreScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl NumberingScheme for MarbreScheme {
    fn name(&self) -> &str {
        "marbre"
    }

    fn info(&self, tr: &dyn Translator) -> String {
        tr.trans("ProposalNumberingMarbre", &[self.prefix.as_str()])
    }

    fn example(&self, _tr: &dyn Translator) -> String {
        format!("{}0501-0001", self.prefix)
    }

    fn can_be_activated(&self, db: &dyn Database) -> bool {
        let conflicts: Vec<_> = db
            .references_with_prefix(&self.prefix)
            .into_iter()
            .filter(|r| matches!(self.split(r), Some(s) if s.parse::<u32>().is_err()))
            .collect();

        if let Some(first) = conflicts.first() {
            warn!(scheme = "marbre", reference = %first, count = conflicts.len(), "non-numeric references block activation");
            return false;
        }
        true
    }

    fn next_value(&self, db: &dyn Database, proposal: &Proposal, tr: &dyn Translator) -> String {
        let Some(next) = self.max_sequence(db).checked_add(1) else {
            error!(scheme = "marbre", prefix = %self.prefix, "reference sequence exhausted");
            return tr.trans("NotAvailable", &[]);
        };
        format!("{}{}-{:04}", self.prefix, proposal.date.format("%y%m"), next)
    }

    fn stability(&self) -> SchemeStability {
        SchemeStability::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryDatabase;
    use crate::i18n::Catalog;
    use chrono::NaiveDate;

    struct Bare;

    impl NumberingScheme for Bare {
        fn name(&self) -> &str {
            "bare"
        }
    }

    struct Tagged(SchemeStability);

    impl NumberingScheme for Tagged {
        fn name(&self) -> &str {
            "tagged"
        }

        fn stability(&self) -> SchemeStability {
            self.0
        }
    }

    fn proposal_on(y: i32, m: u32) -> Proposal {
        Proposal {
            id: 1,
            reference: String::new(),
            customer: "ACME".to_string(),
            date: NaiveDate::from_ymd_opt(y, m, 10).unwrap(),
            lines: vec![],
            note_public: None,
            last_error: None,
        }
    }

    #[test]
    fn test_defaults() {
        let tr = Catalog::builtin();
        let db = MemoryDatabase::new();
        let scheme = Bare;

        assert!(scheme.is_enabled());
        assert!(scheme.can_be_activated(&db));
        assert_eq!(scheme.info(&tr), "No description");
        assert_eq!(scheme.example(&tr), "No example");
        assert_eq!(scheme.next_value(&db, &proposal_on(2024, 1), &tr), "Not available");
        assert_eq!(scheme.version(&tr), "Not available");
    }

    #[test]
    fn test_version_labels() {
        let tr = Catalog::builtin();
        assert_eq!(Tagged(SchemeStability::Development).version(&tr), "Development");
        assert_eq!(Tagged(SchemeStability::Experimental).version(&tr), "Experimental");
        assert_eq!(Tagged(SchemeStability::Stable).version(&tr), ENGINE_VERSION);
        assert_eq!(Tagged(SchemeStability::Unset).version(&tr), "Not available");
    }

    #[test]
    fn test_marbre_first_value() {
        let tr = Catalog::builtin();
        let value = MarbreScheme::new().next_value(&MemoryDatabase::new(), &proposal_on(2024, 3), &tr);
        assert_eq!(value, "PR2403-0001");
    }

    #[test]
    fn test_marbre_sequence_never_resets() {
        let tr = Catalog::builtin();
        let db = MemoryDatabase::with_references(["PR2312-0041", "PR2401-0042", "PRX-9", "FA2401-0100"]);
        let value = MarbreScheme::new().next_value(&db, &proposal_on(2024, 2), &tr);
        assert_eq!(value, "PR2402-0043");
    }

    #[test]
    fn test_marbre_exhausted_sequence_not_available() {
        let tr = Catalog::builtin();
        let db = MemoryDatabase::with_references(["PR2401-0007", "PR2401-4294967295"]);
        let value = MarbreScheme::new().next_value(&db, &proposal_on(2024, 2), &tr);
        assert_eq!(value, "Not available");
    }

    #[test]
    fn test_marbre_activation_conflict() {
        let scheme = MarbreScheme::new();
        assert!(scheme.can_be_activated(&MemoryDatabase::with_references(["PR2401-0001"])));
        assert!(!scheme.can_be_activated(&MemoryDatabase::with_references(["PR2401-0001", "PR2401-ABC"])));
    }

    #[test]
    fn test_marbre_info_and_version() {
        let tr = Catalog::builtin();
        let scheme = MarbreScheme::with_prefix("DEV");
        assert!(scheme.info(&tr).starts_with("Return number with format DEVyymm-nnnn"));
        assert_eq!(scheme.example(&tr), "DEV0501-0001");
        assert_eq!(scheme.version(&tr), ENGINE_VERSION);
    }
}
