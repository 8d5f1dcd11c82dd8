//! `reconbot-recon` — two-source metered transaction reconciliation engine.
//!
//! Pure engine crate: receives parsed tables, returns reconciliation runs and
//! merges them into a bounded history. Byte formats, file storage and
//! delivery live in other crates behind the `HistoryStore` and `Notifier`
//! traits.

pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod keycodec;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod reconcile;

pub use config::{NormalizationRule, ReconConfig};
pub use engine::{execute, reconcile_tables, RunOutcome, RunStats};
pub use error::ReconError;
pub use history::{record, HistoryStore, MemoryStore};
pub use keycodec::canonicalize;
pub use model::{
    Cell, HistoryLog, KeyedAggregate, RawTable, ReconciliationRun, RunOrigin, SourceSide,
    VarianceItem,
};
pub use normalize::normalize;
pub use notify::Notifier;
pub use reconcile::reconcile;
