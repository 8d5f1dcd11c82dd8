use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::error::ReconError;
use crate::model::{KeyedAggregate, Reconciliation, VarianceItem};

/// Join two aggregates on their canonical keys.
///
/// Totals are full sums of each side, independent of which keys match.
/// A key missing from one side counts as zero there. An item is emitted
/// when `|a - b| > tolerance` (strict), sorted by key. A difference that
/// does not fit in a decimal is an `AmountOverflow` error.
pub fn reconcile(
    agg_a: &KeyedAggregate,
    agg_b: &KeyedAggregate,
    tolerance: Decimal,
) -> Result<Reconciliation, ReconError> {
    let keys: BTreeSet<&String> = agg_a.keys().chain(agg_b.keys()).collect();

    let mut items = Vec::new();
    for key in keys {
        let amount_a = agg_a.get(key).unwrap_or(Decimal::ZERO);
        let amount_b = agg_b.get(key).unwrap_or(Decimal::ZERO);
        let diff = checked_diff(amount_a, amount_b, key)?;
        if diff.abs() > tolerance {
            items.push(VarianceItem { key: key.clone(), amount_a, amount_b, diff });
        }
    }

    let (total_a, total_b) = (agg_a.total(), agg_b.total());
    Ok(Reconciliation {
        total_a,
        total_b,
        total_variance: checked_diff(total_a, total_b, "totals")?,
        items,
    })
}

fn checked_diff(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, ReconError> {
    a.checked_sub(b).ok_or_else(|| {
        ReconError::AmountOverflow(format!("{what}: {a} - {b} exceeds the decimal range"))
    })
}
