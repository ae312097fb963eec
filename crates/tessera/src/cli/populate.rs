use super::error::HelpfulError;
use super::{exit_code, print_json, print_summary, until_done, Session};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_schema::ScopeSpecification;
use tessera_worker::populate::spawn;
use tessera_worker::{PopulateRequest, PopulateSource};

#[derive(Debug, clap::Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["value", "copy_from"])))]
pub struct PopulateArgs {
    /// Data file (.ddb)
    #[arg(long)]
    pub data: PathBuf,
    /// Field to set
    #[arg(long)]
    pub field: String,
    /// Set every row to this value
    #[arg(long)]
    pub value: Option<String>,
    /// Copy each row's value of this field
    #[arg(long)]
    pub copy_from: Option<String>,
    /// Only rows under this folder
    #[arg(long, default_value = "")]
    pub scope: ScopeSpecification,
}

pub async fn run(args: PopulateArgs, session: &Session) -> Result<ExitCode> {
    if !args.data.exists() {
        return Err(HelpfulError::file_not_found(&args.data).into());
    }
    let source = match (args.value, args.copy_from) {
        (Some(value), None) => PopulateSource::Value(value),
        (None, Some(field)) => PopulateSource::CopyFrom(field),
        _ => {
            return Err(HelpfulError::new("Give exactly one of --value or --copy-from").into());
        }
    };

    let request = PopulateRequest {
        data_path: args.data,
        field: args.field,
        source,
        scope: args.scope,
    };

    let reporter = session.reporter();
    let token = reporter.token();
    let result = until_done(spawn(request, reporter), &token)
        .await
        .context("Population task stopped unexpectedly")?;

    if session.json {
        print_json(&result)?;
    } else {
        print_summary(&result.outcome, &result.message);
    }
    Ok(exit_code(&result.outcome))
}
