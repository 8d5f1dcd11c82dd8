//! `reconbot run` - fetch, reconcile, record, notify.

use std::path::PathBuf;

use reconbot_io::{read_attachments, AttachmentSource, DirectoryInbox, FilePair, JsonFileStore};
use reconbot_recon::model::{ReconciliationRun, RunOrigin};
use reconbot_recon::notify::NotifyAll;
use reconbot_recon::{execute, Notifier, ReconConfig, ReconError, RunOutcome, RunStats};

use crate::config::load_config;
use crate::exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_NO_SOURCES, EXIT_USAGE};
use crate::notify::WebhookNotifier;
use crate::CliError;

pub struct RunArgs {
    pub inbox: Option<PathBuf>,
    pub source_a: Option<PathBuf>,
    pub source_b: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub history: PathBuf,
    pub manual: bool,
    pub webhooks: Vec<String>,
    pub json: bool,
    pub keep: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let origin = if args.manual { RunOrigin::Manual } else { RunOrigin::Auto };

    let mut source: Box<dyn AttachmentSource> = match (&args.source_a, &args.source_b, &args.inbox) {
        (Some(a), Some(b), _) => Box::new(FilePair { source_a: a.clone(), source_b: b.clone() }),
        (_, _, Some(dir)) => Box::new(DirectoryInbox::new(dir)),
        _ => {
            return Err(CliError::args("no sources given")
                .with_hint("pass --inbox DIR, or --source-a FILE --source-b FILE"));
        }
    };
    let from_inbox = args.source_a.is_none();

    let attachments = source
        .fetch()
        .map_err(|e| CliError::new(EXIT_NO_SOURCES, e))?
        .ok_or_else(|| {
            CliError::new(EXIT_NO_SOURCES, "sources not found")
                .with_hint("nothing was recorded; retry once both files have arrived")
        })?;

    let (table_a, table_b) = read_attachments(&attachments, &config)?;

    let webhooks = args
        .webhooks
        .iter()
        .map(|url| WebhookNotifier::new(url.as_str(), config.name.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::new(EXIT_USAGE, e))?;
    let fan_out = NotifyAll { targets: webhooks.iter().map(|w| w as &dyn Notifier).collect() };
    let notifier = (!webhooks.is_empty()).then_some(&fan_out as &dyn Notifier);

    let store = JsonFileStore::new(&args.history);
    let outcome = execute(&config, Some(table_a), Some(table_b), origin, &store, notifier)?;

    print_summary(&config, &outcome);
    if args.json {
        print_run_json(&outcome.run)?;
    }

    if let Some(err) = outcome.persist_error {
        return Err(persist_failure(err, &args.history));
    }

    if from_inbox && !args.keep {
        if let Err(e) = source.acknowledge() {
            log::warn!("run recorded but inbox files were not moved: {e}");
        }
    }

    if let Some(err) = outcome.notify_error {
        return Err(CliError::from(err).with_hint("the run is recorded; only delivery failed"));
    }

    Ok(())
}

fn persist_failure(err: ReconError, path: &std::path::Path) -> CliError {
    CliError::new(recon_exit_code(&err), err.to_string()).with_hint(format!(
        "the run above was computed but {} was not updated",
        path.display()
    ))
}

fn print_run_json(run: &ReconciliationRun) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(run)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}

/// Human summary to stderr.
fn print_summary(config: &ReconConfig, outcome: &RunOutcome) {
    let run = &outcome.run;
    eprintln!(
        "{}: transaction date {} ({} run)",
        config.name,
        run.transaction_date_label(),
        run.origin
    );
    eprintln!("  total A:   {}", run.total_a);
    eprintln!("  total B:   {}", run.total_b);
    eprintln!("  variance:  {}", run.total_variance);
    eprintln!(
        "  {} key(s) differ by more than {}",
        run.items.len(),
        config.tolerance
    );
    for item in &run.items {
        eprintln!(
            "    {:<14} A {:>12}  B {:>12}  diff {:>12}",
            item.key,
            item.amount_a.to_string(),
            item.amount_b.to_string(),
            item.diff.to_string()
        );
    }
    print_dropped(&outcome.stats);
    if let Some(len) = outcome.history_len {
        eprintln!("  recorded ({len} run(s) in history)");
    }
}

fn print_dropped(stats: &RunStats) {
    for (label, s) in [("A", &stats.source_a), ("B", &stats.source_b)] {
        if s.dropped() > 0 {
            eprintln!(
                "  source {label}: dropped {} row(s) ({} bad amount, {} empty key, {} unreadable)",
                s.dropped(),
                s.rows_bad_amount,
                s.rows_bad_key,
                s.rows_rejected
            );
        }
    }
}
