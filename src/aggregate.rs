//! Per-instrument aggregation of observation series.

use crate::calendar::Window;
use crate::instrument_code::InstrumentCode;
use crate::observation::Observation;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Arithmetic mean of each instrument's observations inside `window`.
///
/// Both window ends are inclusive. Instruments without an observation in the
/// window are absent from the result rather than zero-filled. NaN values are
/// skipped; an instrument whose only values are NaN is absent as well.
///
/// The map is ordered by instrument code, which fixes the input order that
/// later stable sorts fall back on for ties.
pub fn average_over_window(
    observations: &[Observation],
    window: &Window,
) -> BTreeMap<InstrumentCode, f64> {
    let mut sums: BTreeMap<&InstrumentCode, (f64, usize)> = BTreeMap::new();

    for obs in observations
        .iter()
        .filter(|obs| window.contains(obs.trade_date) && !obs.value.is_nan())
    {
        let entry = sums.entry(&obs.code).or_insert((0.0, 0));
        entry.0 += obs.value;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(code, (sum, count))| (code.clone(), sum / count as f64))
        .collect()
}

/// Date the dataset was most recently updated to.
///
/// Takes each instrument's latest trade date and returns the most common
/// one, so a handful of instruments with stray later rows do not move it.
/// Ties go to the later date. Returns `None` for an empty series.
pub fn last_update_date(observations: &[Observation]) -> Option<NaiveDate> {
    let mut latest: HashMap<&InstrumentCode, NaiveDate> = HashMap::new();
    for obs in observations {
        latest
            .entry(&obs.code)
            .and_modify(|date| *date = (*date).max(obs.trade_date))
            .or_insert(obs.trade_date);
    }

    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in latest.into_values() {
        *counts.entry(date).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(date_a, count_a), (date_b, count_b)| {
            count_a.cmp(count_b).then(date_a.cmp(date_b))
        })
        .map(|(date, _)| date)
}
