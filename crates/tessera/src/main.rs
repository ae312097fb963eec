//! Tessera command line front end
//!
//! Reconciles templates with data files, checks out scoped sub-trees of a
//! master data file, exports images, bulk-populates fields and plans merges.
//! Long operations show a progress bar; Ctrl-C cancels them cleanly.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_logging::{init_logging, LogConfig};

mod cli;

use cli::config::TesseraConfig;
use cli::Session;

#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    version,
    about = "Scoped checkout and template reconciliation for annotation databases"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify the differences between two template files
    Classify(cli::template::ClassifyArgs),

    /// Compare a template file with the template a data file was created from
    Reconcile(cli::template::ReconcileArgs),

    /// Write the template a checkout of SCOPE would get
    DeriveTemplate(cli::template::DeriveArgs),

    /// Check out a folder of a master data file into a new template + data file pair
    Checkout(cli::checkout::CheckoutArgs),

    /// Copy the images behind a data file's rows into a folder
    Export(cli::export::ExportArgs),

    /// Set one field on every row in a scope
    Populate(cli::populate::PopulateArgs),

    /// Show how a checked-out data file lines up with its master
    MergePlan(cli::merge::MergePlanArgs),

    /// Print a data file's log
    Log {
        /// Data file (.ddb)
        data: PathBuf,
    },

    /// Show configuration and resolved paths
    Config,
}

async fn run_command(command: Commands, session: &Session) -> Result<ExitCode> {
    match command {
        Commands::Classify(args) => cli::template::run_classify(args, session).await,
        Commands::Reconcile(args) => cli::template::run_reconcile(args, session).await,
        Commands::DeriveTemplate(args) => cli::template::run_derive(args, session).await,
        Commands::Checkout(args) => cli::checkout::run(args, session).await,
        Commands::Export(args) => cli::export::run(args, session).await,
        Commands::Populate(args) => cli::populate::run(args, session).await,
        Commands::MergePlan(args) => cli::merge::run(args, session).await,
        Commands::Log { data } => cli::log::run(&data, session).await,
        Commands::Config => cli::config::run(session),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli::config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Warning: {:#}; using default settings", err);
            TesseraConfig::default()
        }
    };

    if let Err(err) = init_logging(LogConfig {
        app_name: "tessera",
        verbose: cli.verbose,
        filter: config.log.filter.as_deref(),
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let session = Session::new(cli.json, config);
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")
        .and_then(|runtime| runtime.block_on(run_command(cli.command, &session)));

    match result {
        Ok(code) => code,
        Err(err) => {
            if session.json {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
