//! # ChatDB CLI (`chatdb`)
//!
//! Ask questions of a relational or document database in plain language.
//!
//! ## Usage
//!
//! ```bash
//! chatdb --config ./config/chatdb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatdb init` | Create an empty database |
//! | `chatdb schema` | Print the introspected schema |
//! | `chatdb prompt "<request>"` | Print the prompt that would be sent for a request |
//! | `chatdb ask "<request>"` | Generate, parse and execute a query |
//! | `chatdb run "<query>"` | Parse and execute query text directly |
//! | `chatdb import <files>` | Load JSON / NDJSON files into a document database |
//! | `chatdb completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Relational
//! chatdb ask --store sql --db shop "orders over 100"
//!
//! # Document, show the query without running it
//! chatdb ask --store document --db clinic --dry-run "doctors named Smith"
//!
//! # Run a literal document query
//! chatdb run --store document --db clinic "('doctors', {'specialty': 'ENT'})"
//! ```
//!
//! The exit status is non-zero when a request fails or any statement fails.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use chatdb::config::{self, Config};
use chatdb::generation::{create_provider, DisabledProvider, GenerationProvider};
use chatdb::pipeline::{Pipeline, QueryReport};
use chatdb::{import, migrate, output};
use chatdb_core::StoreKind;

const DEFAULT_CONFIG: &str = "./config/chatdb.toml";

/// ChatDB CLI: natural-language queries over SQL and document databases.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing default config file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "chatdb",
    about = "ChatDB: natural-language queries over SQL and document databases",
    version,
    long_about = "ChatDB introspects a database, asks a text-generation provider for a query, \
    parses the reply with a restricted literal parser (never evaluating it), and executes it \
    against a SQLite database or a JSON document collection."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Log pipeline stages to stderr (same as RUST_LOG=debug).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Target {
    /// Store kind: `sql` or `document`.
    #[arg(long, default_value = "sql")]
    store: StoreKind,

    /// Database name.
    #[arg(long)]
    db: String,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create an empty database.
    ///
    /// Idempotent; running it on an existing database is safe.
    Init {
        #[command(flatten)]
        target: Target,
    },

    /// Print the schema summary used to build prompts.
    Schema {
        #[command(flatten)]
        target: Target,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the prompt that would be sent for a request.
    Prompt {
        #[command(flatten)]
        target: Target,

        /// The natural-language request.
        request: String,
    },

    /// Generate a query for a request and execute it.
    Ask {
        #[command(flatten)]
        target: Target,

        /// The natural-language request.
        request: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Stop after parsing; print the query without executing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse and execute query text directly, without generation.
    ///
    /// SQL statements for `--store sql`; a `(collection, body)` literal for
    /// `--store document`.
    Run {
        #[command(flatten)]
        target: Target,

        /// Query text.
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        payload: Option<String>,

        /// Read the query text from a file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Load JSON, JSON array or NDJSON files into a document database.
    ///
    /// Each file becomes a collection named after the file; an existing
    /// collection with that name is replaced.
    Import {
        /// Document database name (created if missing).
        #[arg(long)]
        db: String,

        /// Files to import.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.is_empty() => EnvFilter::new(spec),
        _ if verbose => EnvFilter::new("chatdb=debug,chatdb_core=debug"),
        _ => EnvFilter::new("warn"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    config::load_config(path)
}

fn print_report(report: &QueryReport, json: bool) -> Result<()> {
    if json {
        println!("{}", output::to_json(report)?);
    } else {
        print!("{}", output::report_text(report));
    }
    Ok(())
}

fn exit_status(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "chatdb", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let cfg = load_config(&cli.config)?;

    // Only `ask` needs a working provider.
    let provider: Box<dyn GenerationProvider> = match &cli.command {
        Commands::Ask { .. } => create_provider(&cfg.generation)?,
        _ => Box::new(DisabledProvider),
    };
    let pipeline = Pipeline::new(&cfg, provider);

    match cli.command {
        Commands::Init { target } => {
            migrate::init_database(&cfg, target.store, &target.db).await?;
            println!("{} database '{}' ready.", target.store, target.db);
        }
        Commands::Schema { target, json } => {
            let schema = pipeline.schema(target.store, &target.db).await?;
            if json {
                println!("{}", output::to_json(&schema)?);
            } else {
                print!("{}", output::schema_text(target.store, &target.db, &schema));
            }
        }
        Commands::Prompt { target, request } => {
            let prompt = pipeline.prompt(target.store, &target.db, &request).await?;
            println!("{}", prompt);
        }
        Commands::Ask {
            target,
            request,
            json,
            dry_run,
        } => {
            let compiled = pipeline.compile(target.store, &target.db, &request).await?;
            if dry_run {
                if json {
                    println!("{}", output::to_json(&compiled)?);
                } else {
                    print!("{}", output::compiled_text(&compiled));
                }
                return Ok(ExitCode::SUCCESS);
            }
            let report = pipeline.execute(compiled).await?;
            print_report(&report, json)?;
            return Ok(exit_status(report.is_success()));
        }
        Commands::Run {
            target,
            payload,
            file,
            json,
        } => {
            let text = match (payload, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("provide query text or --file"),
            };
            let report = pipeline.run_payload(target.store, &target.db, &text).await?;
            print_report(&report, json)?;
            return Ok(exit_status(report.is_success()));
        }
        Commands::Import { db, files } => {
            let summaries = import::import_files(&cfg, &db, &files).await?;
            print!("{}", output::import_text(&summaries));
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
