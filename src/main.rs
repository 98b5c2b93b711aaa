//! Binary entry point for healthcare-loader.
//!
//! This binary provides the CLI interface for loading, exporting and
//! checking the patient encounter collection.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use healthcare_loader::config::ReplaceMode;
use healthcare_loader::io::{ExportService, ImportOptions, ImportService, LoadedTable};
use healthcare_loader::observability;
use healthcare_loader::services::{
    EXPORTED_MESSAGE, INSERTED_MESSAGE, IntegrityService, Pipeline, PipelineConfig,
};
use healthcare_loader::storage::SqliteDocumentStore;
use healthcare_loader::{DocumentStore, LoaderConfig};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Loads patient encounter records into a document collection and exports
/// them back out.
#[derive(Parser)]
#[command(name = "healthcare-loader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database holding the collection.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Collection name.
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that replace the collection.
#[derive(clap::Args, Debug, Default)]
struct ReplaceArgs {
    /// Replace mode: `delete_then_insert` or `atomic`.
    #[arg(long)]
    replace_mode: Option<String>,

    /// Fail before writing if the source holds duplicate encounters.
    #[arg(long)]
    reject_duplicates: bool,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Load a source file, replacing the collection contents.
    Load {
        /// Delimited source file.
        source: PathBuf,

        #[command(flatten)]
        replace: ReplaceArgs,
    },

    /// Export the collection to a file.
    Export {
        /// Output file.
        output: PathBuf,
    },

    /// Load a source file, then export the collection.
    Run {
        /// Delimited source file.
        source: PathBuf,

        /// Output file for the export stage.
        #[arg(short, long)]
        export: Option<PathBuf>,

        #[command(flatten)]
        replace: ReplaceArgs,
    },

    /// Check the collection for integrity violations.
    Check {
        /// Source file to compare the collection's export against.
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Previously exported file to compare instead of a fresh export.
        #[arg(short, long, requires = "source")]
        export: Option<PathBuf>,

        /// Rows compared value by value.
        #[arg(long, default_value_t = healthcare_loader::services::DEFAULT_COMPARE_ROWS)]
        rows: usize,
    },

    /// Show the effective configuration.
    Config,
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Resolves configuration: file, environment, then CLI flags.
fn load_config(cli: &Cli) -> healthcare_loader::Result<LoaderConfig> {
    let mut config = LoaderConfig::resolve(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config = config.with_database(database);
    }
    if let Some(collection) = &cli.collection {
        config = config.with_collection(collection.as_str())?;
    }
    Ok(config)
}

/// Runs the selected command.
fn run_command(command: Commands, config: &LoaderConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Load { source, replace } => cmd_load(config, &source, None, &replace),
        Commands::Run {
            source,
            export,
            replace,
        } => cmd_load(config, &source, export, &replace),
        Commands::Export { output } => cmd_export(config, &output),
        Commands::Check {
            source,
            export,
            rows,
        } => cmd_check(config, source.as_deref(), export.as_deref(), rows),
        Commands::Config => {
            cmd_config(config);
            Ok(())
        },
    }
}

/// Opens the configured collection.
fn open_store(config: &LoaderConfig) -> healthcare_loader::Result<SqliteDocumentStore> {
    SqliteDocumentStore::open(&config.database, &config.collection)
}

/// Builds replace options from configuration and flags.
fn import_options(
    config: &LoaderConfig,
    args: &ReplaceArgs,
) -> healthcare_loader::Result<ImportOptions> {
    let replace_mode = match &args.replace_mode {
        Some(mode) => ReplaceMode::parse(mode)?,
        None => config.replace_mode,
    };
    Ok(ImportOptions {
        replace_mode,
        reject_duplicates: args.reject_duplicates || config.reject_duplicates,
    })
}

/// Load command, optionally followed by an export.
fn cmd_load(
    config: &LoaderConfig,
    source: &Path,
    export: Option<PathBuf>,
    replace: &ReplaceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;

    let mut pipeline = PipelineConfig::from_loader_config(config, source)
        .with_options(import_options(config, replace)?);
    if let Some(path) = export {
        pipeline = pipeline.with_export(path);
    }

    let outcome = Pipeline::run(&store, &pipeline)?;
    println!(
        "{INSERTED_MESSAGE} ({} inserted, {} replaced)",
        outcome.import.inserted, outcome.import.deleted
    );
    if let Some(export) = &outcome.export {
        println!(
            "{EXPORTED_MESSAGE} ({} rows to {})",
            export.exported,
            export.output_path.as_deref().unwrap_or("-")
        );
    }

    store.close()?;
    Ok(())
}

/// Export command.
fn cmd_export(config: &LoaderConfig, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let result = ExportService::new()
        .with_delimiter(config.delimiter)
        .export_to_file(&store, output)?;
    println!(
        "{EXPORTED_MESSAGE} ({} rows to {})",
        result.exported,
        output.display()
    );
    store.close()?;
    Ok(())
}

/// Check command.
fn cmd_check(
    config: &LoaderConfig,
    source: Option<&Path>,
    export: Option<&Path>,
    rows: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let service = IntegrityService::new().with_compare_rows(rows);

    let report = service.check(&store)?;
    println!("{report}");
    let mut clean = report.is_clean();

    if let Some(source) = source {
        let importer = ImportService::new().with_delimiter(config.delimiter);
        let source_table = importer.load_file(source)?;
        let exported_table = match export {
            Some(path) => importer.load_file(path)?,
            None => fresh_export(&store, config.delimiter)?,
        };

        let mismatches = service.compare(&source_table, &exported_table);
        if mismatches.is_empty() {
            println!(
                "Round trip matches: {} rows, {} columns",
                source_table.row_count(),
                source_table.columns.len()
            );
        } else {
            clean = false;
            for mismatch in &mismatches {
                println!("  {mismatch}");
            }
        }
    }

    store.close()?;
    if clean {
        Ok(())
    } else {
        Err("integrity check failed".into())
    }
}

/// Exports the collection in memory and reads it back.
fn fresh_export(
    store: &dyn DocumentStore,
    delimiter: u8,
) -> healthcare_loader::Result<LoadedTable> {
    let mut buffer = Vec::new();
    ExportService::new()
        .with_delimiter(delimiter)
        .export_to_writer(store, &mut buffer)?;
    if buffer.is_empty() {
        // Empty collection: no header was written
        return Ok(LoadedTable {
            columns: Vec::new(),
            records: Vec::new(),
        });
    }
    ImportService::new()
        .with_delimiter(delimiter)
        .load_reader(Cursor::new(buffer))
}

/// Config command.
fn cmd_config(config: &LoaderConfig) {
    println!("database          = {}", config.database.display());
    println!("collection        = {}", config.collection);
    println!("delimiter         = {:?}", char::from(config.delimiter));
    println!("replace_mode      = {}", config.replace_mode.as_str());
    println!("reject_duplicates = {}", config.reject_duplicates);
    println!("log_format        = {:?}", config.logging.format);
}
