//! Contract Invariant Tests
//!
//! Resolution precedence, charset restoration and the partial-failure
//! policy for triggers.

use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use propal_docgen::{
    pipeline::FALLBACK_TEMPLATE,
    triggers::PROPAL_BUILDDOC,
    Catalog, DbHandle, DispatchContext, DispatchError, DocgenConfig, DocumentDispatcher,
    GenerationRequest, MemoryDatabase, OutputLanguage, PreviewCleaner, Proposal, ProposalLine,
    ResolutionSource, TemplateMeta, TemplateRegistry, TemplateUnit, TriggerBus, TriggerError,
    TriggerEvent, UnitCatalog, UnitError, User, WriteRequest,
};

const HOST_CHARSET: &str = "ISO-8859-15";

struct WritingUnit;

impl TemplateUnit for WritingUnit {
    fn write_file(&mut self, request: &WriteRequest<'_>, langs: &mut OutputLanguage) -> Result<PathBuf, UnitError> {
        langs.charset_output = "UTF-8".to_string();
        Ok(request.output_dir.join(format!("{}.pdf", request.proposal.reference)))
    }
}

struct FailingUnit;

impl TemplateUnit for FailingUnit {
    fn write_file(&mut self, _request: &WriteRequest<'_>, langs: &mut OutputLanguage) -> Result<PathBuf, UnitError> {
        langs.charset_output = "UTF-8".to_string();
        Err(UnitError::Rejected("write_file returned 0".to_string()))
    }
}

fn writing_unit(_db: DbHandle) -> Box<dyn TemplateUnit> {
    Box::new(WritingUnit)
}

fn failing_unit(_db: DbHandle) -> Box<dyn TemplateUnit> {
    Box::new(FailingUnit)
}

#[derive(Clone, Default)]
struct CountingPreviews(Rc<Cell<u32>>);

impl PreviewCleaner for CountingPreviews {
    fn delete_previews(&self, _proposal: &Proposal) {
        self.0.set(self.0.get() + 1);
    }
}

#[derive(Clone, Default)]
struct ScriptedTriggers {
    fired: Rc<RefCell<Vec<String>>>,
    errors: Vec<String>,
}

impl TriggerBus for ScriptedTriggers {
    fn run_triggers(&self, event: &TriggerEvent<'_>) -> Result<(), TriggerError> {
        self.fired.borrow_mut().push(event.name.to_string());
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(TriggerError { errors: self.errors.clone() })
        }
    }
}

struct Harness {
    _tmp: tempfile::TempDir,
    config: DocgenConfig,
    previews: CountingPreviews,
    triggers: ScriptedTriggers,
    registry: TemplateRegistry,
    units: UnitCatalog,
}

impl Harness {
    fn new(default_template: Option<&str>) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = DocgenConfig {
            default_template: default_template.map(str::to_string),
            template_root: tmp.path().join("templates"),
            output_dir: tmp.path().join("out"),
            ..Default::default()
        };

        let mut units = UnitCatalog::new();
        for id in ["azur", "cyan", "custom", "jaune", "vert"] {
            units.register(id, writing_unit);
        }
        units.register("broken", failing_unit);

        Self {
            _tmp: tmp,
            config,
            previews: CountingPreviews::default(),
            triggers: ScriptedTriggers::default(),
            registry: TemplateRegistry::new(),
            units,
        }
    }

    fn install(&self, id: &str) {
        let path = self.config.unit_path(id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn dispatcher(&self) -> DocumentDispatcher {
        DocumentDispatcher::new(
            self.registry.clone(),
            self.units.clone(),
            Box::new(self.previews.clone()),
            Box::new(self.triggers.clone()),
        )
    }

    fn run(
        &self,
        requested: &str,
        proposal: &mut Proposal,
        langs: &mut OutputLanguage,
    ) -> Result<propal_docgen::GenerationOutcome, DispatchError> {
        let tr = Catalog::builtin();
        let user = User::new("admin");
        let ctx = DispatchContext {
            config: &self.config,
            db: MemoryDatabase::new().into_handle(),
            user: &user,
            translator: &tr,
        };
        self.dispatcher()
            .generate(&ctx, proposal, &GenerationRequest::with_template(requested), langs)
    }

    fn fired(&self) -> Vec<String> {
        self.triggers.fired.borrow().clone()
    }
}

fn create_proposal() -> Proposal {
    Proposal {
        id: 42,
        reference: "PR2403-0042".to_string(),
        customer: "ACME".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        lines: vec![ProposalLine {
            product_ref: Some("SVC-1".to_string()),
            label: "Consulting".to_string(),
            description: Some("Two days on site".to_string()),
            qty: 2.0,
            unit_price: 800.0,
        }],
        note_public: None,
        last_error: None,
    }
}

fn host_langs() -> OutputLanguage {
    OutputLanguage {
        code: "fr_FR".to_string(),
        charset_output: HOST_CHARSET.to_string(),
    }
}

#[test]
fn invariant_scenario_a_configured_default_dispatches_once() {
    let h = Harness::new(Some("azur"));
    h.install("azur");
    let mut langs = host_langs();

    let outcome = h.run("", &mut create_proposal(), &mut langs).unwrap();

    assert_eq!(outcome.template_id, "azur");
    assert_eq!(outcome.source, ResolutionSource::ConfiguredDefault);
    assert!(outcome.triggers_ok());
    assert_eq!(h.fired(), vec![PROPAL_BUILDDOC]);
    assert_eq!(h.previews.0.get(), 1);
    assert_eq!(langs.charset_output, HOST_CHARSET);
}

#[test]
fn invariant_scenario_b_missing_request_falls_back_to_configured() {
    let h = Harness::new(Some("azur"));
    h.install("azur");

    let outcome = h.run("custom", &mut create_proposal(), &mut host_langs()).unwrap();

    assert_eq!(outcome.template_id, "azur");
    assert_eq!(outcome.source, ResolutionSource::ConfiguredDefault);
}

#[test]
fn invariant_scenario_c_nothing_configured_nothing_installed() {
    let h = Harness::new(None);
    let mut langs = host_langs();

    let err = h.run("", &mut create_proposal(), &mut langs).unwrap_err();

    match &err {
        DispatchError::ConfigurationMissing { attempted } => {
            let blank = h.config.unit_path("");
            assert!(!attempted.contains(&blank));
            assert!(attempted.iter().all(|p| p.file_name().unwrap() != "pdf_propale_.unit"));
        }
        other => panic!("expected ConfigurationMissing, got {other:?}"),
    }
    assert_eq!(
        err.user_message(&Catalog::builtin()),
        "Error Constant PROPALE_ADDON_PDF not defined"
    );
    assert!(h.fired().is_empty());
    assert_eq!(langs.charset_output, HOST_CHARSET);
}

#[test]
fn invariant_scenario_d_generation_failure_is_final() {
    let h = Harness::new(Some("azur"));
    h.install("azur");
    h.install("broken");
    let mut proposal = create_proposal();
    let mut langs = host_langs();

    let err = h.run("broken", &mut proposal, &mut langs).unwrap_err();

    match &err {
        DispatchError::GenerationFailed { template, message } => {
            assert_eq!(template, "broken");
            assert_eq!(message, "write_file returned 0");
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
    assert_eq!(proposal.last_error.as_deref(), Some("write_file returned 0"));
    assert_eq!(langs.charset_output, HOST_CHARSET);
    assert_eq!(h.previews.0.get(), 0);
    assert!(h.fired().is_empty());
}

#[test]
fn invariant_scenario_e_trigger_failure_keeps_success() {
    let mut h = Harness::new(Some("azur"));
    h.install("azur");
    h.triggers.errors = vec!["ErrorMailNotSent".to_string(), "ErrorWebhookTimeout".to_string()];
    let mut langs = host_langs();

    let outcome = h.run("", &mut create_proposal(), &mut langs).unwrap();

    assert!(!outcome.triggers_ok());
    assert_eq!(outcome.trigger_errors, vec!["ErrorMailNotSent", "ErrorWebhookTimeout"]);
    assert_eq!(h.fired(), vec![PROPAL_BUILDDOC]);
    assert_eq!(langs.charset_output, HOST_CHARSET);
}

#[test]
fn invariant_requested_template_used_verbatim() {
    let h = Harness::new(Some("azur"));
    h.install("azur");
    h.install("cyan");

    let outcome = h.run("cyan", &mut create_proposal(), &mut host_langs()).unwrap();
    assert_eq!(outcome.template_id, "cyan");
    assert_eq!(outcome.source, ResolutionSource::Requested);
}

#[test]
fn invariant_configured_default_beats_builtin() {
    let h = Harness::new(Some("cyan"));
    h.install(FALLBACK_TEMPLATE);
    h.install("cyan");

    let outcome = h.run("", &mut create_proposal(), &mut host_langs()).unwrap();
    assert_eq!(outcome.template_id, "cyan");
}

#[test]
fn invariant_registry_first_entry_selected() {
    let mut h = Harness::new(Some("gone"));
    h.registry.register(TemplateMeta::new("vert", "propale").with_priority(5));
    h.registry.register(TemplateMeta::new("jaune", "propale").with_priority(1));
    h.install("jaune");
    h.install("vert");

    let outcome = h.run("custom", &mut create_proposal(), &mut host_langs()).unwrap();
    assert_eq!(outcome.template_id, "jaune");
    assert_eq!(outcome.source, ResolutionSource::Registry);
}

#[test]
fn invariant_missing_file_message_names_path() {
    let h = Harness::new(Some("gone"));

    let err = h.run("custom", &mut create_proposal(), &mut host_langs()).unwrap_err();

    let expected = h.config.unit_path("gone");
    assert!(matches!(&err, DispatchError::TemplateFileNotFound { path } if *path == expected));
    assert!(err
        .user_message(&Catalog::builtin())
        .contains(&expected.display().to_string()));
}

#[test]
fn invariant_builtin_summary_end_to_end() {
    let mut h = Harness::new(None);
    h.units = UnitCatalog::with_builtins();
    h.install(FALLBACK_TEMPLATE);

    let doc_dir = h.config.output_dir.join("PR2403-0042");

    let mut langs = host_langs();
    let outcome = h.run("", &mut create_proposal(), &mut langs).unwrap();

    assert_eq!(outcome.source, ResolutionSource::BuiltinFallback);
    assert_eq!(outcome.document, doc_dir.join("PR2403-0042.json"));
    assert!(outcome.document.exists());
    assert!(Path::new(&format!("{}.sha256", outcome.document.display())).exists());
    // SummaryUnit forces UTF-8 while writing
    assert_eq!(langs.charset_output, HOST_CHARSET);
}

#[test]
fn invariant_missing_request_without_default_skips_builtin() {
    let h = Harness::new(None);
    h.install(FALLBACK_TEMPLATE);
    let mut langs = host_langs();

    let err = h.run("custom", &mut create_proposal(), &mut langs).unwrap_err();

    match &err {
        DispatchError::ConfigurationMissing { attempted } => {
            assert_eq!(attempted, &vec![h.config.unit_path("custom")]);
        }
        other => panic!("expected ConfigurationMissing, got {other:?}"),
    }
    assert!(h.fired().is_empty());
    assert_eq!(langs.charset_output, HOST_CHARSET);
}
