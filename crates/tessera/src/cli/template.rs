//! Template commands: classify, reconcile, derive-template

use super::error::HelpfulError;
use super::{print_json, Session};
use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_schema::{
    apply_choice, classify, derive_scoped_schema, load_template, reconcile, AppliedChoice,
    CompatibilityReport, ScopeSpecification, TemplateChoice, TemplateStore,
};

/// Exit code when a report contains blocking differences.
const EXIT_INCOMPATIBLE: u8 = 2;

#[derive(Debug, clap::Args)]
pub struct ClassifyArgs {
    /// Template currently in use (.tdb)
    pub old: PathBuf,
    /// Template to compare against it (.tdb)
    pub new: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct ReconcileArgs {
    /// Template file (.tdb)
    #[arg(long)]
    pub template: PathBuf,
    /// Data file (.ddb)
    #[arg(long)]
    pub data: PathBuf,
    /// Apply a decision: new, old or abort
    #[arg(long)]
    pub choice: Option<TemplateChoice>,
}

#[derive(Debug, clap::Args)]
pub struct DeriveArgs {
    /// Template file (.tdb)
    #[arg(long)]
    pub template: PathBuf,
    /// Folder the checkout would be rooted at, e.g. Site1/Cam2
    #[arg(long)]
    pub scope: ScopeSpecification,
    /// Where to write the derived template; must not exist
    #[arg(long)]
    pub out: PathBuf,
}

pub async fn run_classify(args: ClassifyArgs, session: &Session) -> Result<ExitCode> {
    let old = load_template(&args.old).await.map_err(HelpfulError::from)?;
    let new = load_template(&args.new).await.map_err(HelpfulError::from)?;
    let report = classify(&old, &new);

    if session.json {
        print_json(&serde_json::json!({
            "report": report,
            "legal_choices": report.legal_choices(),
        }))?;
    } else {
        print_report(&report);
    }
    Ok(report_exit_code(&report))
}

pub async fn run_reconcile(args: ReconcileArgs, session: &Session) -> Result<ExitCode> {
    let reconciliation = reconcile(&args.template, &args.data)
        .await
        .map_err(HelpfulError::from)?;
    let report = &reconciliation.report;

    let applied = match args.choice {
        Some(choice) if !report.is_legal(choice) => {
            return Err(HelpfulError::illegal_choice(choice, &report.legal_choices()).into());
        }
        Some(choice) => Some(
            apply_choice(&reconciliation, choice)
                .await
                .map_err(HelpfulError::from)?,
        ),
        None => None,
    };

    if session.json {
        print_json(&serde_json::json!({
            "report": report,
            "legal_choices": report.legal_choices(),
            "applied": applied.as_ref().map(describe_applied),
        }))?;
        return Ok(report_exit_code(report));
    }

    print_report(report);
    match &applied {
        Some(applied) => println!("{}", describe_applied(applied)),
        None if !report.is_identical() => {
            let legal: Vec<&str> = report
                .legal_choices()
                .iter()
                .map(TemplateChoice::as_str)
                .collect();
            println!(
                "Choose with --choice {} (no change has been made)",
                legal.join("|")
            );
        }
        None => {}
    }
    Ok(report_exit_code(report))
}

pub async fn run_derive(args: DeriveArgs, session: &Session) -> Result<ExitCode> {
    let template = load_template(&args.template).await.map_err(HelpfulError::from)?;
    let scoped = derive_scoped_schema(&template, args.scope.levels_to_ignore())
        .map_err(HelpfulError::from)?;
    TemplateStore::create(&args.out, &scoped)
        .await
        .map_err(HelpfulError::from)?
        .close()
        .await;

    if session.json {
        print_json(&serde_json::json!({
            "path": args.out.to_string_lossy(),
            "levels": scoped.levels,
            "controls": scoped.controls.len(),
        }))?;
    } else {
        println!("Wrote {}", args.out.display());
        for level in &scoped.levels {
            println!("  level {}: {}", level.level, level.alias);
        }
        println!("  {} control(s)", scoped.controls.len());
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &CompatibilityReport) {
    if report.is_identical() {
        println!("Templates are identical.");
        return;
    }
    for error in &report.errors {
        println!("  \x1b[31mERROR\x1b[0m   {}", error);
    }
    for warning in &report.warnings {
        println!("  \x1b[33mWARNING\x1b[0m {}", warning);
    }
    println!();
    println!(
        "{} error(s), {} warning(s)",
        report.errors.len(),
        report.warnings.len()
    );
}

fn describe_applied(applied: &AppliedChoice) -> String {
    match applied {
        AppliedChoice::Updated { columns_added } if columns_added.is_empty() => {
            "The data file now uses the new template.".to_string()
        }
        AppliedChoice::Updated { columns_added } => format!(
            "The data file now uses the new template; added column(s): {}",
            columns_added.join(", ")
        ),
        AppliedChoice::KeptOld => "The data file keeps its own template.".to_string(),
        AppliedChoice::Aborted => "Aborted; nothing was changed.".to_string(),
    }
}

fn report_exit_code(report: &CompatibilityReport) -> ExitCode {
    if report.has_errors() {
        ExitCode::from(EXIT_INCOMPATIBLE)
    } else {
        ExitCode::SUCCESS
    }
}
