// src/report.rs

//! Human-facing output: per-task log lines and the end-of-build summary.

use std::io::{self, Write};

use indicatif::HumanBytes;
use tracing::{info, warn};

use crate::engine::session::{BuildSession, ExecutionResult, TaskStatus};

/// `<task-id> <elapsed-time> <output-size>`.
pub fn log_line(result: &ExecutionResult) -> String {
    let size = match result.output_bytes {
        Some(bytes) => HumanBytes(bytes).to_string(),
        None => "-".to_string(),
    };
    format!("{} {:.2?} {}", result.task, result.elapsed, size)
}

/// Print one line per failed or skipped task, then the totals.
pub fn print_summary(session: &BuildSession, out: &mut impl Write) -> io::Result<()> {
    for result in session.results() {
        match &result.status {
            TaskStatus::Succeeded => {}
            TaskStatus::Failed => writeln!(
                out,
                "FAILED  {}: {}",
                result.task,
                result.error.as_deref().unwrap_or("unknown error")
            )?,
            TaskStatus::Skipped(reason) => {
                writeln!(out, "skipped {}: {}", result.task, reason)?
            }
        }
    }

    writeln!(
        out,
        "{} succeeded, {} failed, {} skipped{}",
        session.succeeded().count(),
        session.failed().count(),
        session.skipped().count(),
        if session.was_cancelled() { " (cancelled)" } else { "" }
    )
}

/// Log a finished pass (used in watch mode, where nothing goes to stdout).
pub fn log_session(session: &BuildSession) {
    let failed = session.failed().count();
    if failed == 0 && !session.was_cancelled() {
        info!(tasks = session.len(), "pass finished");
        return;
    }
    for result in session.failed() {
        warn!(
            task = %result.task,
            error = result.error.as_deref().unwrap_or("unknown error"),
            "task failed"
        );
    }
    warn!(
        failed,
        skipped = session.skipped().count(),
        cancelled = session.was_cancelled(),
        "pass finished with problems"
    );
}
