use super::error::HelpfulError;
use super::{exit_code, print_json, print_summary, until_done, Session};
use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_schema::ScopeSpecification;
use tessera_worker::{CheckoutEngine, CheckoutRequest};

#[derive(Debug, clap::Args)]
pub struct CheckoutArgs {
    /// Master template file (.tdb)
    #[arg(long)]
    pub template: PathBuf,
    /// Master data file (.ddb)
    #[arg(long)]
    pub data: PathBuf,
    /// Folder to check out, relative to the master's root; empty for all
    #[arg(long, default_value = "")]
    pub scope: ScopeSpecification,
    /// Folder that receives the new template and data file
    #[arg(long)]
    pub dest: PathBuf,
}

pub async fn run(args: CheckoutArgs, session: &Session) -> Result<ExitCode> {
    for path in [&args.template, &args.data] {
        if !path.exists() {
            return Err(HelpfulError::file_not_found(path).into());
        }
    }

    let request = CheckoutRequest {
        master_data_path: args.data,
        master_schema_path: args.template,
        scope: args.scope,
        destination_folder: args.dest,
    };

    let reporter = session.reporter();
    let token = reporter.token();
    let handle = CheckoutEngine::new().spawn(request, reporter);
    let result = until_done(handle.wait(), &token).await;

    if session.json {
        print_json(&result)?;
    } else {
        print_summary(&result.outcome, &result.message);
        if let (true, Some(schema), Some(data)) = (
            result.success(),
            &result.created_schema_path,
            &result.created_data_path,
        ) {
            println!("Template: {}", schema.display());
            println!("Data:     {}", data.display());
        }
    }
    Ok(exit_code(&result.outcome))
}
