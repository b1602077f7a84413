//! Batch selection before graph construction

use crate::data::TracerouteBatch;
use std::collections::HashSet;

/// Keep only traceroutes whose timestamp lies in the inclusive window.
///
/// Either bound may be open. Traceroutes without a timestamp are kept,
/// since there is nothing to compare against.
pub fn retain_time_window(
    batch: &mut TracerouteBatch,
    ts_min: Option<i64>,
    ts_max: Option<i64>,
) -> usize {
    let before = batch.len();

    batch.traceroutes.retain(|trace| match trace.ts {
        Some(ts) => {
            ts_min.map_or(true, |min| ts >= min) && ts_max.map_or(true, |max| ts <= max)
        }
        None => true,
    });

    let removed = before - batch.len();
    if removed > 0 {
        log::debug!("Dropped {} traceroutes outside the time window", removed);
    }
    removed
}

/// Drop traceroutes whose id is in `hidden`
pub fn exclude_ids<S: AsRef<str>>(batch: &mut TracerouteBatch, hidden: &[S]) -> usize {
    if hidden.is_empty() {
        return 0;
    }

    let hidden: HashSet<&str> = hidden.iter().map(|s| s.as_ref()).collect();
    let before = batch.len();

    batch.traceroutes.retain(|trace| {
        trace
            .id
            .as_deref()
            .map_or(true, |id| !hidden.contains(id))
    });

    let removed = before - batch.len();
    log::debug!("Hid {} traceroutes by id", removed);
    removed
}
