use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::history::{record_to, HistoryStore};
use crate::model::{NormalizeStats, RawTable, ReconciliationRun, RunOrigin, SourceSide};
use crate::normalize::normalize;
use crate::notify::Notifier;
use crate::reconcile::reconcile;

/// Per-source row accounting for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub source_a: NormalizeStats,
    pub source_b: NormalizeStats,
}

/// Everything a caller needs after `execute`.
///
/// The run is always present once computation succeeded; persistence and
/// delivery failures are reported alongside it.
#[derive(Debug)]
pub struct RunOutcome {
    pub run: ReconciliationRun,
    pub stats: RunStats,
    /// Length of the history log after recording, if the save succeeded.
    pub history_len: Option<usize>,
    pub persist_error: Option<ReconError>,
    pub notify_error: Option<ReconError>,
}

/// Normalize both tables, reconcile them and build the run. No I/O.
pub fn reconcile_tables(
    config: &ReconConfig,
    table_a: &RawTable,
    table_b: &RawTable,
    origin: RunOrigin,
    run_time: DateTime<Utc>,
) -> Result<(ReconciliationRun, RunStats), ReconError> {
    let a = normalize(table_a, &config.source_a, SourceSide::A)?;
    let b = normalize(table_b, &config.source_b, SourceSide::B)?;

    let recon = reconcile(&a.aggregate, &b.aggregate, config.tolerance)?;
    let run = ReconciliationRun::new(run_time, a.transaction_date, recon, origin);

    Ok((run, RunStats { source_a: a.stats, source_b: b.stats }))
}

/// One full invocation: compute, record, notify.
///
/// A missing table aborts before anything is computed or recorded.
pub fn execute(
    config: &ReconConfig,
    table_a: Option<RawTable>,
    table_b: Option<RawTable>,
    origin: RunOrigin,
    store: &dyn HistoryStore,
    notifier: Option<&dyn Notifier>,
) -> Result<RunOutcome, ReconError> {
    let (table_a, table_b) = match (table_a, table_b) {
        (Some(a), Some(b)) => (a, b),
        (a, b) => {
            let mut missing = Vec::new();
            if a.is_none() {
                missing.push(SourceSide::A);
            }
            if b.is_none() {
                missing.push(SourceSide::B);
            }
            return Err(ReconError::SourceUnavailable { missing });
        }
    };

    log::info!("{}: reconciling ({} run)", config.name, origin);
    let (run, stats) = reconcile_tables(config, &table_a, &table_b, origin, Utc::now())?;
    log::info!(
        "{}: date {}, totals {} / {}, variance {}, {} item(s) over {}",
        config.name,
        run.transaction_date_label(),
        run.total_a,
        run.total_b,
        run.total_variance,
        run.items.len(),
        config.tolerance,
    );

    let (history_len, persist_error) = match record_to(store, &run, config.history.max_runs) {
        Ok(log) => (Some(log.len()), None),
        Err(e) => {
            log::error!("{}: run computed but not recorded: {e}", config.name);
            (None, Some(e))
        }
    };

    let notify_error = notifier.and_then(|n| match n.notify(&run) {
        Ok(()) => None,
        Err(e) => {
            log::warn!("{}: notification failed: {e}", config.name);
            Some(e)
        }
    });

    Ok(RunOutcome { run, stats, history_len, persist_error, notify_error })
}
