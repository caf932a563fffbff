use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::Period;
use crate::error::Result;
use crate::record::RecordSet;
use crate::utils::mean;

/// One bucket on the trend line. Values are whole currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: NaiveDate,
    pub sum: f64,
    pub ma_7: f64,
    pub ma_30: f64,
}

/// Bucket sums over a contiguous period axis with 7- and 30-bucket
/// trailing means. The windows expand from a single bucket, so every
/// point has defined averages from the very first period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendTable {
    pub period: Period,
    pub points: Vec<TrendPoint>,
}

impl TrendTable {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, period: NaiveDate) -> Option<&TrendPoint> {
        self.points
            .binary_search_by_key(&period, |point| point.period)
            .ok()
            .map(|index| &self.points[index])
    }
}

pub fn trends(records: &RecordSet, period: Period) -> Result<TrendTable> {
    let mut grouped: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        *grouped.entry(period.bucket(record.date)).or_insert(0.0) += record.amount;
    }

    let axis = period.axis(records.min_date(), records.max_date());
    let sums: Vec<f64> = axis
        .iter()
        .map(|bucket| grouped.get(bucket).copied().unwrap_or(0.0))
        .collect();

    let points = axis
        .into_iter()
        .enumerate()
        .map(|(index, bucket)| TrendPoint {
            period: bucket,
            sum: sums[index].round(),
            ma_7: trailing_mean(&sums, index, 7),
            ma_30: trailing_mean(&sums, index, 30),
        })
        .collect();

    Ok(TrendTable { period, points })
}

fn trailing_mean(sums: &[f64], index: usize, window: usize) -> f64 {
    let start = (index + 1).saturating_sub(window);
    mean(&sums[start..=index]).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SalesRecord;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_expanding_windows_cover_early_periods() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 1), "A", "c1", 100.0),
            SalesRecord::new(d(2024, 1, 2), "A", "c1", 200.0),
            SalesRecord::new(d(2024, 1, 4), "A", "c1", 400.0),
        ])
        .unwrap();

        let table = trends(&set, Period::Daily).unwrap();
        assert_eq!(table.len(), 4);

        let first = table.get(d(2024, 1, 1)).unwrap();
        assert_eq!(first.sum, 100.0);
        assert_eq!(first.ma_7, 100.0);
        assert_eq!(first.ma_30, 100.0);

        // The empty Jan 3 contributes a zero to later windows.
        let third = table.get(d(2024, 1, 3)).unwrap();
        assert_eq!(third.sum, 0.0);
        assert_eq!(third.ma_7, 100.0);

        let fourth = table.get(d(2024, 1, 4)).unwrap();
        assert_eq!(fourth.ma_7, 175.0);
    }

    #[test]
    fn test_window_slides_after_seven_buckets() {
        let records: Vec<SalesRecord> = (1..=9)
            .map(|day| SalesRecord::new(d(2024, 1, day), "A", "c1", day as f64 * 10.0))
            .collect();
        let set = RecordSet::new(records).unwrap();

        let table = trends(&set, Period::Daily).unwrap();

        // Day 7: mean of 10..=70. Day 8 drops day 1, day 9 drops day 2.
        assert_eq!(table.get(d(2024, 1, 7)).unwrap().ma_7, 40.0);
        assert_eq!(table.get(d(2024, 1, 8)).unwrap().ma_7, 50.0);
        assert_eq!(table.get(d(2024, 1, 9)).unwrap().ma_7, 60.0);

        // The 30-bucket window is still expanding: mean of 10..=90.
        assert_eq!(table.get(d(2024, 1, 9)).unwrap().ma_30, 50.0);
    }

    #[test]
    fn test_monthly_trend() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 10), "A", "c1", 300.0),
            SalesRecord::new(d(2024, 3, 10), "A", "c1", 600.0),
        ])
        .unwrap();

        let table = trends(&set, Period::Monthly).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(d(2024, 2, 29)).unwrap().sum, 0.0);

        let march = table.get(d(2024, 3, 31)).unwrap();
        assert_eq!(march.ma_7, 300.0);
    }

    #[test]
    fn test_averages_are_always_finite() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 1), "A", "c1", 0.0),
            SalesRecord::new(d(2024, 1, 9), "A", "c1", 10.0),
        ])
        .unwrap();

        let table = trends(&set, Period::Daily).unwrap();
        for point in &table.points {
            assert!(point.ma_7.is_finite());
            assert!(point.ma_30.is_finite());
        }
    }
}
