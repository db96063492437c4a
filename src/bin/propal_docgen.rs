//! Propal Docgen CLI - Bridge interface for the host
//!
//! Commands: templates, generate, next-ref
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a document could not be generated

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use propal_docgen::{
    host::FsPreviewCleaner,
    triggers::TracingListener,
    Catalog, DispatchContext, DocgenConfig, DocumentDispatcher, GenerationRequest, MarbreScheme,
    MemoryDatabase, NumberingScheme, OutputLanguage, Proposal, TemplateRegistry, TriggerDispatcher,
    UnitCatalog, User,
};

#[derive(Parser)]
#[command(name = "propal-docgen")]
#[command(about = "Propal Docgen - proposal document generation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON message catalog layered over the built-in one
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List enabled templates of the configured family
    Templates,

    /// Generate the document for a proposal
    Generate {
        /// Template ID ('' for the configured default)
        #[arg(short, long, default_value = "")]
        template: String,

        /// JSON payload (Proposal)
        #[arg(short, long)]
        payload: String,

        /// Output language code
        #[arg(short, long, default_value = "en_US")]
        lang: String,

        /// Acting user login
        #[arg(short, long, default_value = "admin")]
        user: String,

        #[arg(long)]
        hide_details: bool,

        #[arg(long)]
        hide_description: bool,

        #[arg(long)]
        hide_reference: bool,
    },

    /// Compute the next proposal reference
    NextRef {
        /// Proposal date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// References already recorded, comma separated
        #[arg(short, long, value_delimiter = ',')]
        existing: Vec<String>,
    },
}

fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => println!(r#"{{"error": "Cannot encode output: {}"}}"#, e),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match DocgenConfig::resolve(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            emit(&json!({"success": false, "error": e.to_string()}));
            return ExitCode::FAILURE;
        }
    };

    let catalog = match cli.catalog.as_deref().map(Catalog::load).transpose() {
        Ok(c) => c.unwrap_or_default(),
        Err(e) => {
            emit(&json!({"success": false, "error": e.to_string()}));
            return ExitCode::FAILURE;
        }
    };

    let registry = match TemplateRegistry::load_from_dir(&config.template_root.join(&config.family)) {
        Ok(r) => r,
        Err(e) => {
            emit(&json!({"success": false, "error": format!("Failed to load templates: {}", e)}));
            return ExitCode::FAILURE;
        }
    };

    let mut triggers = TriggerDispatcher::new();
    triggers.register(Box::new(TracingListener));

    let dispatcher = DocumentDispatcher::new(
        registry,
        UnitCatalog::with_builtins(),
        Box::new(FsPreviewCleaner::new(config.output_dir.clone())),
        Box::new(triggers),
    );

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = dispatcher
                .list_models(&config.family)
                .into_iter()
                .map(|(id, meta)| json!({
                    "id": id,
                    "name": meta.name,
                    "description": meta.description,
                    "priority": meta.priority,
                }))
                .collect();

            emit(&Value::Array(templates));
            ExitCode::SUCCESS
        }

        Commands::Generate {
            template,
            payload,
            lang,
            user,
            hide_details,
            hide_description,
            hide_reference,
        } => {
            let mut proposal: Proposal = match serde_json::from_str(&payload) {
                Ok(p) => p,
                Err(e) => {
                    emit(&json!({"success": false, "error": format!("Invalid payload: {}", e)}));
                    return ExitCode::FAILURE;
                }
            };

            let request = GenerationRequest {
                template,
                src_template_path: None,
                hide_details,
                hide_description,
                hide_reference,
            };
            let user = User::new(user);
            let ctx = DispatchContext {
                config: &config,
                db: MemoryDatabase::new().into_handle(),
                user: &user,
                translator: &catalog,
            };
            let mut outputlangs = OutputLanguage::new(lang);

            match dispatcher.generate(&ctx, &mut proposal, &request, &mut outputlangs) {
                Ok(outcome) => {
                    emit(&json!({"success": true, "outcome": outcome}));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    emit(&json!({"success": false, "error": e.user_message(&catalog)}));
                    ExitCode::from(2)
                }
            }
        }

        Commands::NextRef { date, existing } => {
            let scheme = MarbreScheme::new();
            let db = MemoryDatabase::with_references(existing);
            let proposal = Proposal {
                id: 0,
                reference: String::new(),
                customer: String::new(),
                date,
                lines: vec![],
                note_public: None,
                last_error: None,
            };

            emit(&json!({
                "scheme": scheme.name(),
                "version": scheme.version(&catalog),
                "canBeActivated": scheme.can_be_activated(&db),
                "next": scheme.next_value(&db, &proposal, &catalog),
            }));
            ExitCode::SUCCESS
        }
    }
}
