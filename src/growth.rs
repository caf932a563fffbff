use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregate::{GroupField, Period};
use crate::error::Result;
use crate::record::RecordSet;
use crate::utils::{pct_change, round2};

/// Period-over-period growth of summed amount, one column per group.
///
/// The period axis carries only buckets with at least one record; inside
/// it, a group without sales counts as 0 so rates stay defined for every
/// cell. The first period is always 0 (nothing to compare against).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthTable {
    pub period: Period,
    pub group_field: GroupField,
    pub periods: Vec<NaiveDate>,
    pub groups: Vec<String>,
    /// Row-major rates in percent: `rates[period_index][group_index]`.
    pub rates: Vec<Vec<f64>>,
}

impl GrowthTable {
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() || self.groups.is_empty()
    }

    pub fn rate(&self, period: NaiveDate, group: &str) -> Option<f64> {
        let row = self.periods.iter().position(|p| *p == period)?;
        let column = self.groups.iter().position(|g| g == group)?;
        Some(self.rates[row][column])
    }
}

/// Computes the growth-rate pivot for one grouping dimension at one
/// period width. Records missing the grouping attribute are excluded.
pub fn growth_rates(
    records: &RecordSet,
    group_field: GroupField,
    period: Period,
) -> Result<GrowthTable> {
    let mut sums: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();
    for record in records {
        if let Some(group) = group_field.value(record) {
            *sums
                .entry((period.bucket(record.date), group.to_string()))
                .or_insert(0.0) += record.amount;
        }
    }

    let mut periods: Vec<NaiveDate> = sums.keys().map(|(bucket, _)| *bucket).collect();
    periods.sort_unstable();
    periods.dedup();

    let mut groups: Vec<String> = sums.keys().map(|(_, group)| group.clone()).collect();
    groups.sort_unstable();
    groups.dedup();

    let mut rates: Vec<Vec<f64>> = Vec::with_capacity(periods.len());
    let mut previous: Vec<Option<f64>> = vec![None; groups.len()];

    for bucket in &periods {
        let mut row = Vec::with_capacity(groups.len());
        for (index, group) in groups.iter().enumerate() {
            let sum = sums
                .get(&(*bucket, group.clone()))
                .copied()
                .unwrap_or(0.0);
            let rate = match previous[index] {
                None => 0.0,
                Some(prev) => pct_change(prev, sum),
            };
            row.push(round2(rate));
            previous[index] = Some(sum);
        }
        rates.push(row);
    }

    debug!(
        "growth rates over {} {} buckets and {} groups",
        periods.len(),
        period.label(),
        groups.len()
    );

    Ok(GrowthTable {
        period,
        group_field,
        periods,
        groups,
        rates,
    })
}
