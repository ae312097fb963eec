use super::error::HelpfulError;
use super::{confirm, exit_code, print_json, print_summary, until_done, Session};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_schema::ScopeSpecification;
use tessera_worker::{Confirmation, ExportEngine, ExportRequest, NamingMode, RowFilter, Verdict};

#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    /// Data file (.ddb)
    #[arg(long)]
    pub data: PathBuf,
    /// Folder the data file's relative paths start from
    #[arg(long)]
    pub images: PathBuf,
    /// Destination folder
    #[arg(long)]
    pub dest: PathBuf,
    /// Keep each image's relative folder below the destination
    #[arg(long)]
    pub preserve_paths: bool,
    /// Only rows under this folder
    #[arg(long, default_value = "")]
    pub scope: ScopeSpecification,
    /// Only rows where FIELD=VALUE
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub filter: Option<String>,
    /// Overwrite existing destination files without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

fn parse_filter(input: &str) -> Result<RowFilter, HelpfulError> {
    match input.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => Ok(RowFilter {
            field: field.trim().to_string(),
            value: value.to_string(),
        }),
        _ => Err(HelpfulError::invalid_assignment(input)),
    }
}

pub async fn run(args: ExportArgs, session: &Session) -> Result<ExitCode> {
    if !args.data.exists() {
        return Err(HelpfulError::file_not_found(&args.data).into());
    }
    let filter = args.filter.as_deref().map(parse_filter).transpose()?;
    let request = ExportRequest {
        data_path: args.data,
        image_root: args.images,
        destination: args.dest,
        mode: if args.preserve_paths {
            NamingMode::PreservePaths
        } else {
            NamingMode::Flatten
        },
        scope: args.scope,
        filter,
    };

    let engine = ExportEngine::new();
    let prepared = engine
        .prepare(&request)
        .await
        .context("Failed to prepare the export")?;

    let confirmation = match prepared.scan.verdict(Confirmation::NotAsked) {
        Verdict::NeedsConfirmation { existing_count } if args.yes => {
            tracing::info!(existing_count, "Overwrite confirmed by --yes");
            Confirmation::Granted
        }
        Verdict::NeedsConfirmation { existing_count } if !session.json => {
            let question = format!(
                "{} file(s) already exist in {}. Overwrite them?",
                existing_count,
                request.destination.display()
            );
            if confirm(&question)? {
                Confirmation::Granted
            } else {
                Confirmation::Refused
            }
        }
        _ => Confirmation::NotAsked,
    };

    let reporter = session.reporter();
    let token = reporter.token();
    let handle = engine.spawn(prepared, confirmation, reporter);
    let result = until_done(handle, &token)
        .await
        .context("Export task stopped unexpectedly")?;

    if session.json {
        print_json(&result)?;
    } else {
        print_summary(&result.outcome, &result.message);
    }
    Ok(exit_code(&result.outcome))
}
