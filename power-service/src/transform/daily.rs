use std::collections::{BTreeMap, BTreeSet};

use power_client::domain::Reading;
use time::Date;

use super::SAMPLES_PER_DAY;

#[derive(Debug, Default)]
pub struct DailyOutcome {
    /// Readings of every complete day, ascending by timestamp.
    pub readings: Vec<Reading>,
    pub days_kept: usize,
    pub days_dropped: usize,
}

/// Keep only `(company, day)` groups holding exactly [`SAMPLES_PER_DAY`]
/// readings at distinct timestamps, one per quarter-hour slot. A day is
/// stored whole or not at all; nothing is interpolated.
pub fn retain_complete_days(candidates: Vec<Reading>) -> DailyOutcome {
    let mut groups: BTreeMap<(String, Date), Vec<Reading>> = BTreeMap::new();
    for reading in candidates {
        groups
            .entry((reading.company.clone(), reading.ts.date()))
            .or_default()
            .push(reading);
    }

    let mut outcome = DailyOutcome::default();
    for ((company, day), group) in groups {
        let slots = group.iter().map(|r| r.ts).collect::<BTreeSet<_>>().len();
        if group.len() == SAMPLES_PER_DAY && slots == SAMPLES_PER_DAY {
            outcome.days_kept += 1;
            outcome.readings.extend(group);
        } else {
            outcome.days_dropped += 1;
            tracing::warn!(
                company = %company,
                day = %day,
                samples = group.len(),
                slots,
                expected = SAMPLES_PER_DAY,
                "dropping incomplete day"
            );
        }
    }

    // Stable, so equal timestamps from different companies keep map order.
    outcome.readings.sort_by_key(|r| r.ts);

    if outcome.days_dropped > 0 {
        metrics::counter!("ingest_days_dropped_total").increment(outcome.days_dropped as u64);
    }
    outcome
}
