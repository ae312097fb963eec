use super::error::HelpfulError;
use super::{print_json, Session};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_schema::ScopeSpecification;
use tessera_worker::{MergeBack, MergeRequest, PathPartitionMerge};

#[derive(Debug, clap::Args)]
pub struct MergePlanArgs {
    /// Checked-out template file (.tdb)
    #[arg(long)]
    pub child_template: PathBuf,
    /// Checked-out data file (.ddb)
    #[arg(long)]
    pub child_data: PathBuf,
    /// Master template file (.tdb)
    #[arg(long)]
    pub template: PathBuf,
    /// Master data file (.ddb)
    #[arg(long)]
    pub data: PathBuf,
    /// Scope the child was checked out with
    #[arg(long)]
    pub scope: ScopeSpecification,
}

pub async fn run(args: MergePlanArgs, session: &Session) -> Result<ExitCode> {
    for path in [
        &args.child_template,
        &args.child_data,
        &args.template,
        &args.data,
    ] {
        if !path.exists() {
            return Err(HelpfulError::file_not_found(path).into());
        }
    }

    let request = MergeRequest {
        child_schema_path: args.child_template,
        child_data_path: args.child_data,
        master_schema_path: args.template,
        master_data_path: args.data,
        scope: args.scope,
    };
    let plan = PathPartitionMerge
        .plan(&request)
        .await
        .context("Failed to build the merge plan")?;

    if session.json {
        print_json(&plan)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "MERGE PLAN ({} -> {})",
        request.child_data_path.display(),
        request.master_data_path.display()
    );
    println!();
    println!("Child rows:            {}", plan.child_rows);
    println!("Master rows in scope:  {}", plan.master_rows_in_scope);
    println!("  matched:             {}", plan.matched_rows);
    println!("  new in child:        {}", plan.new_in_child);
    println!("  missing from child:  {}", plan.missing_in_child);
    println!();
    println!("Folders:");
    for path in &plan.rewritten_paths {
        let child = if path.child.is_empty() {
            "(root)"
        } else {
            path.child.as_str()
        };
        println!("  {} -> {}", child, path.master);
    }
    println!();
    if plan.is_mergeable() {
        println!(
            "Templates are compatible ({} warning(s)).",
            plan.compatibility.warnings.len()
        );
    } else {
        println!("Templates are NOT compatible:");
        for error in &plan.compatibility.errors {
            println!("  {}", error);
        }
    }
    Ok(ExitCode::SUCCESS)
}
