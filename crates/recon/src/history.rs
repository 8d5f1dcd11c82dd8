//! Run Recorder: merge a finished run into the bounded history log.

use std::sync::Mutex;

use crate::error::ReconError;
use crate::model::{HistoryLog, ReconciliationRun};

/// Prepend `run` and keep at most `max_runs` entries, newest first.
///
/// Identical inputs still produce a new entry; the log is an audit trail.
pub fn record(run: ReconciliationRun, history: HistoryLog, max_runs: usize) -> HistoryLog {
    history.prepend_bounded(run, max_runs.max(1))
}

/// Backing store for the history log.
///
/// `load` never fails: an absent or unreadable store is an empty log.
/// `save` failures are surfaced to the caller.
pub trait HistoryStore {
    fn load(&self) -> HistoryLog;

    fn save(&self, log: &HistoryLog) -> Result<(), ReconError>;

    /// One read-modify-write cycle. Stores shared between processes override
    /// this to hold a lock across the cycle.
    fn update(
        &self,
        apply: &mut dyn FnMut(HistoryLog) -> HistoryLog,
    ) -> Result<HistoryLog, ReconError> {
        let next = apply(self.load());
        self.save(&next)?;
        Ok(next)
    }
}

/// Record `run` through `store` in a single read-modify-write.
pub fn record_to(
    store: &dyn HistoryStore,
    run: &ReconciliationRun,
    max_runs: usize,
) -> Result<HistoryLog, ReconError> {
    store.update(&mut |history| record(run.clone(), history, max_runs))
}

/// In-process store. The mutex serialises concurrent recorders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    log: Mutex<HistoryLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HistoryLog {
        self.load()
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> HistoryLog {
        match self.log.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, log: &HistoryLog) -> Result<(), ReconError> {
        let mut guard = self
            .log
            .lock()
            .map_err(|_| ReconError::HistoryStore("history lock poisoned".into()))?;
        *guard = log.clone();
        Ok(())
    }

    fn update(
        &self,
        apply: &mut dyn FnMut(HistoryLog) -> HistoryLog,
    ) -> Result<HistoryLog, ReconError> {
        let mut guard = self
            .log
            .lock()
            .map_err(|_| ReconError::HistoryStore("history lock poisoned".into()))?;
        let next = apply(std::mem::take(&mut *guard));
        *guard = next.clone();
        Ok(next)
    }
}
