//! CLI command implementations

pub mod checkout;
pub mod config;
pub mod error;
pub mod export;
pub mod log;
pub mod merge;
pub mod populate;
pub mod progress;
pub mod template;

use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tessera_worker::{CancellationToken, Outcome, ProgressReporter, ProgressSink, SilentSink};

use config::TesseraConfig;
use progress::BarSink;

/// Exit code for a cancelled operation (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

/// Settings shared by every command of one invocation.
pub struct Session {
    pub json: bool,
    pub config: TesseraConfig,
}

impl Session {
    pub fn new(json: bool, config: TesseraConfig) -> Self {
        Self { json, config }
    }

    /// A reporter for one operation: progress bars on a terminal, nothing
    /// in JSON mode.
    pub fn reporter(&self) -> Arc<ProgressReporter> {
        let sink: Arc<dyn ProgressSink> = if self.json {
            Arc::new(SilentSink)
        } else {
            Arc::new(BarSink::new())
        };
        Arc::new(ProgressReporter::new(sink).with_settings(self.config.progress_settings()))
    }
}

/// Await `task`. The first Ctrl-C requests cancellation; the task is still
/// awaited so it can stop at its next unit of work and report what it did.
pub async fn until_done<T>(task: impl Future<Output = T>, token: &CancellationToken) -> T {
    tokio::pin!(task);
    tokio::select! {
        output = &mut task => output,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling... waiting for the current step to stop");
            token.cancel();
            task.await
        }
    }
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> io::Result<bool> {
    eprint!("{} [y/N] ", question);
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn exit_code(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Completed => ExitCode::SUCCESS,
        Outcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
        Outcome::Failed(_) => ExitCode::from(1),
    }
}

/// Closing line for a finished operation.
pub fn print_summary(outcome: &Outcome, message: &str) {
    match outcome {
        Outcome::Completed => eprintln!("  \x1b[32m✓\x1b[0m {}", message),
        Outcome::Cancelled => eprintln!("  \x1b[33m■\x1b[0m {}", message),
        Outcome::Failed(_) => eprintln!("  \x1b[31m✗\x1b[0m {}", message),
    }
}
