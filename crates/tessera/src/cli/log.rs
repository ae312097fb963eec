use super::error::HelpfulError;
use super::{print_json, Session};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tessera_db::TesseraDb;

/// Print the log of a data file: one line per checkout and other recorded
/// operations.
pub async fn run(data: &Path, session: &Session) -> Result<ExitCode> {
    if !data.exists() {
        return Err(HelpfulError::file_not_found(data).into());
    }
    let db = TesseraDb::open_read_only(data)
        .await
        .with_context(|| format!("Failed to open {}", data.display()))?;
    let log = async {
        db.require_data_file().await?;
        db.read_log().await
    }
    .await;
    db.close().await;
    let log = log.with_context(|| format!("Failed to read the log of {}", data.display()))?;

    if session.json {
        let lines: Vec<&str> = log.lines().collect();
        print_json(&serde_json::json!({ "lines": lines }))?;
    } else if log.is_empty() {
        println!("(log is empty)");
    } else {
        println!("{}", log.trim_end());
    }
    Ok(ExitCode::SUCCESS)
}
