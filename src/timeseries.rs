use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggFn, Period};
use crate::error::Result;
use crate::record::RecordSet;
use crate::utils::{mean, pct_change, round2, sample_std};

/// Aggregate statistics for one calendar bucket, plus the percent change
/// of `sum` against the previous bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period: NaiveDate,
    pub sum: f64,
    pub count: u64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub pct_change: f64,
}

/// Chronological per-bucket statistics at one period width. The axis is
/// contiguous across the record span; buckets without records appear as
/// zero rows rather than being skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesTable {
    pub period: Period,
    pub rows: Vec<PeriodStats>,
}

impl TimeSeriesTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, period: NaiveDate) -> Option<&PeriodStats> {
        self.rows
            .binary_search_by_key(&period, |row| row.period)
            .ok()
            .map(|index| &self.rows[index])
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|row| row.sum).sum()
    }
}

/// The same record set viewed at all three period widths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesBundle {
    pub daily: TimeSeriesTable,
    pub weekly: TimeSeriesTable,
    pub monthly: TimeSeriesTable,
}

pub fn time_series_metrics(records: &RecordSet) -> Result<TimeSeriesBundle> {
    let bundle = TimeSeriesBundle {
        daily: table_for(records, Period::Daily),
        weekly: table_for(records, Period::Weekly),
        monthly: table_for(records, Period::Monthly),
    };
    debug!(
        "time series: {} daily, {} weekly, {} monthly buckets",
        bundle.daily.len(),
        bundle.weekly.len(),
        bundle.monthly.len()
    );
    Ok(bundle)
}

fn table_for(records: &RecordSet, period: Period) -> TimeSeriesTable {
    let mut grouped: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(period.bucket(record.date))
            .or_default()
            .push(record.amount);
    }

    let axis = period.axis(records.min_date(), records.max_date());
    let mut rows = Vec::with_capacity(axis.len());
    let mut prev_sum: Option<f64> = None;

    for bucket in axis {
        let values = grouped.get(&bucket).map(Vec::as_slice).unwrap_or(&[]);
        let sum: f64 = values.iter().sum();
        // Change is computed on unrounded sums; rounding happens last.
        let change = match prev_sum {
            None => 0.0,
            Some(prev) => pct_change(prev, sum),
        };

        rows.push(PeriodStats {
            period: bucket,
            sum: round2(sum),
            count: values.len() as u64,
            mean: round2(mean(values)),
            std: round2(sample_std(values)),
            min: round2(AggFn::Min.apply(values)),
            max: round2(AggFn::Max.apply(values)),
            pct_change: round2(change),
        });
        prev_sum = Some(sum);
    }

    TimeSeriesTable { period, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SalesRecord;
    use crate::utils::PCT_CHANGE_CAP;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_day_over_day_change() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 1), "productA", "cust1", 1000.0),
            SalesRecord::new(d(2024, 1, 2), "productA", "cust1", 3000.0),
        ])
        .unwrap();

        let bundle = time_series_metrics(&set).unwrap();
        let daily = &bundle.daily;
        assert_eq!(daily.len(), 2);
        assert_eq!(daily.get(d(2024, 1, 1)).unwrap().sum, 1000.0);
        assert_eq!(daily.get(d(2024, 1, 1)).unwrap().pct_change, 0.0);
        assert_eq!(daily.get(d(2024, 1, 2)).unwrap().sum, 3000.0);
        assert_eq!(daily.get(d(2024, 1, 2)).unwrap().pct_change, 200.0);
    }

    #[test]
    fn test_gaps_become_zero_rows() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 1), "A", "c1", 1000.0),
            SalesRecord::new(d(2024, 1, 4), "A", "c1", 500.0),
        ])
        .unwrap();

        let daily = time_series_metrics(&set).unwrap().daily;
        assert_eq!(daily.len(), 4);

        let quiet = daily.get(d(2024, 1, 2)).unwrap();
        assert_eq!(quiet.sum, 0.0);
        assert_eq!(quiet.count, 0);
        assert_eq!(quiet.mean, 0.0);
        assert_eq!(quiet.std, 0.0);
        assert_eq!(quiet.pct_change, -100.0);

        // Recovering from a zero bucket hits the cap instead of infinity.
        assert_eq!(daily.get(d(2024, 1, 4)).unwrap().pct_change, PCT_CHANGE_CAP);
    }

    #[test]
    fn test_bucket_statistics() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 1), "A", "c1", 100.0),
            SalesRecord::new(d(2024, 1, 1), "B", "c2", 300.0),
            SalesRecord::new(d(2024, 1, 1), "C", "c3", 200.0),
        ])
        .unwrap();

        let day = &time_series_metrics(&set).unwrap().daily.rows[0];
        assert_eq!(day.sum, 600.0);
        assert_eq!(day.count, 3);
        assert_eq!(day.mean, 200.0);
        assert_eq!(day.min, 100.0);
        assert_eq!(day.max, 300.0);
        assert_eq!(day.std, 100.0);
    }

    #[test]
    fn test_weekly_and_monthly_bucketing() {
        let set = RecordSet::new(vec![
            // Week of Mon 2024-01-01
            SalesRecord::new(d(2024, 1, 3), "A", "c1", 100.0),
            SalesRecord::new(d(2024, 1, 7), "A", "c1", 200.0),
            // Week of Mon 2024-01-08, still January
            SalesRecord::new(d(2024, 1, 8), "A", "c1", 50.0),
            // February
            SalesRecord::new(d(2024, 2, 2), "A", "c1", 1000.0),
        ])
        .unwrap();

        let bundle = time_series_metrics(&set).unwrap();

        let first_week = bundle.weekly.get(d(2024, 1, 1)).unwrap();
        assert_eq!(first_week.sum, 300.0);
        assert_eq!(first_week.count, 2);

        assert_eq!(bundle.monthly.len(), 2);
        assert_eq!(bundle.monthly.get(d(2024, 1, 31)).unwrap().sum, 350.0);
        assert_eq!(bundle.monthly.get(d(2024, 2, 29)).unwrap().sum, 1000.0);

        // Every view accounts for the same grand total.
        assert!((bundle.daily.total() - 1350.0).abs() < 0.01);
        assert!((bundle.weekly.total() - 1350.0).abs() < 0.01);
        assert!((bundle.monthly.total() - 1350.0).abs() < 0.01);
    }
}
