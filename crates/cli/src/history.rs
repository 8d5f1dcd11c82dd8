//! `reconbot history` - list recorded runs.

use std::io::{self, Write};
use std::path::PathBuf;

use reconbot_io::JsonFileStore;
use reconbot_recon::model::ReconciliationRun;
use reconbot_recon::HistoryStore;

use crate::exit_codes::EXIT_ERROR;
use crate::CliError;

pub fn cmd_history(path: PathBuf, limit: Option<usize>, json: bool) -> Result<(), CliError> {
    let store = JsonFileStore::new(&path);
    let log = store.load();
    let runs: Vec<&ReconciliationRun> =
        log.runs().iter().take(limit.unwrap_or(usize::MAX)).collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let write_err = |e: io::Error| CliError::new(EXIT_ERROR, format!("cannot write output: {e}"));

    if json {
        let text = serde_json::to_string_pretty(&runs)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        writeln!(out, "{text}").map_err(write_err)?;
        return Ok(());
    }

    if runs.is_empty() {
        eprintln!("no runs recorded in {}", path.display());
        return Ok(());
    }

    writeln!(
        out,
        "{:<25} {:<10} {:<6} {:>14} {:>14} {:>12} {:>5}",
        "run_time", "date", "origin", "total_a", "total_b", "variance", "items"
    )
    .map_err(write_err)?;
    for run in runs {
        writeln!(out, "{}", format_row(run)).map_err(write_err)?;
    }
    Ok(())
}

fn format_row(run: &ReconciliationRun) -> String {
    format!(
        "{:<25} {:<10} {:<6} {:>14} {:>14} {:>12} {:>5}",
        run.run_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        run.transaction_date_label(),
        run.origin.to_string(),
        run.total_a.to_string(),
        run.total_b.to_string(),
        run.total_variance.to_string(),
        run.items.len(),
    )
}
