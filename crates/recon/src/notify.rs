use crate::error::ReconError;
use crate::model::ReconciliationRun;

/// Delivery of a finished run (webhook, mail, dashboard push).
///
/// Called after the history write, whatever its outcome. A failure here
/// never rolls the history back.
pub trait Notifier {
    fn notify(&self, run: &ReconciliationRun) -> Result<(), ReconError>;
}

/// Fan a run out to several notifiers; every one is attempted.
pub struct NotifyAll<'a> {
    pub targets: Vec<&'a dyn Notifier>,
}

impl Notifier for NotifyAll<'_> {
    fn notify(&self, run: &ReconciliationRun) -> Result<(), ReconError> {
        let failures: Vec<String> = self
            .targets
            .iter()
            .filter_map(|n| n.notify(run).err())
            .map(|e| match e {
                ReconError::Notify(msg) => msg,
                other => other.to_string(),
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ReconError::Notify(failures.join("; ")))
        }
    }
}
