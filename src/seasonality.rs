use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::aggregate::Period;
use crate::error::Result;
use crate::record::RecordSet;
use crate::utils::mean;

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Cyclical bucket a record falls into, depending on the analysis width:
/// day of week for daily, calendar month for weekly, month of year for
/// monthly. The ordering is chronological (Monday first for weekdays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeasonalityKey {
    /// 0 = Monday .. 6 = Sunday.
    Weekday(u32),
    YearMonth { year: i32, month: u32 },
    /// 1 = January .. 12 = December, pooled across years.
    Month(u32),
}

impl SeasonalityKey {
    pub fn label(&self) -> String {
        match self {
            SeasonalityKey::Weekday(index) => WEEKDAY_NAMES
                .get(*index as usize)
                .copied()
                .unwrap_or("unknown")
                .to_string(),
            SeasonalityKey::YearMonth { year, month } => format!("{year}-{month:02}"),
            SeasonalityKey::Month(month) => month.to_string(),
        }
    }
}

/// Mean amount and record count for one cyclical bucket, in whole
/// currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityRow {
    pub key: SeasonalityKey,
    pub mean: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityTable {
    pub period: Period,
    pub rows: Vec<SeasonalityRow>,
}

impl SeasonalityTable {
    pub fn get(&self, key: &SeasonalityKey) -> Option<&SeasonalityRow> {
        self.rows.iter().find(|row| &row.key == key)
    }
}

/// Groups amounts by the cyclical bucket matching the period width. Only
/// buckets that actually carry records appear; rows come out sorted.
pub fn seasonality(records: &RecordSet, period: Period) -> Result<SeasonalityTable> {
    let mut grouped: BTreeMap<SeasonalityKey, Vec<f64>> = BTreeMap::new();
    for record in records {
        let key = match period {
            Period::Daily => SeasonalityKey::Weekday(record.date.weekday().num_days_from_monday()),
            Period::Weekly => SeasonalityKey::YearMonth {
                year: record.date.year(),
                month: record.date.month(),
            },
            Period::Monthly => SeasonalityKey::Month(record.date.month()),
        };
        grouped.entry(key).or_default().push(record.amount);
    }

    let rows = grouped
        .into_iter()
        .map(|(key, values)| SeasonalityRow {
            key,
            mean: mean(&values).round(),
            count: values.len() as u64,
        })
        .collect();

    Ok(SeasonalityTable { period, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SalesRecord;
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_weekday_grouping_is_monday_first() {
        // 2024-01-01 and 2024-01-08 are Mondays, 01-03 a Wednesday,
        // 01-07 a Sunday.
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 3), "A", "c1", 300.0),
            SalesRecord::new(d(2024, 1, 1), "A", "c1", 100.0),
            SalesRecord::new(d(2024, 1, 8), "A", "c1", 200.0),
            SalesRecord::new(d(2024, 1, 7), "A", "c1", 50.0),
        ])
        .unwrap();

        let table = seasonality(&set, Period::Daily).unwrap();
        let labels: Vec<String> = table.rows.iter().map(|row| row.key.label()).collect();
        assert_eq!(labels, vec!["Monday", "Wednesday", "Sunday"]);

        let monday = table.get(&SeasonalityKey::Weekday(0)).unwrap();
        assert_eq!(monday.mean, 150.0);
        assert_eq!(monday.count, 2);
    }

    #[test]
    fn test_weekly_uses_calendar_months_in_order() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 15), "A", "c1", 400.0),
            SalesRecord::new(d(2023, 12, 20), "A", "c1", 100.0),
        ])
        .unwrap();

        let table = seasonality(&set, Period::Weekly).unwrap();
        assert_eq!(
            table.rows[0].key,
            SeasonalityKey::YearMonth {
                year: 2023,
                month: 12
            }
        );
        assert_eq!(table.rows[0].key.label(), "2023-12");
        assert_eq!(table.rows[1].key.label(), "2024-01");
    }

    #[test]
    fn test_monthly_pools_across_years() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2023, 1, 10), "A", "c1", 100.0),
            SalesRecord::new(d(2024, 1, 10), "A", "c1", 300.0),
            SalesRecord::new(d(2024, 3, 10), "A", "c1", 500.0),
        ])
        .unwrap();

        let table = seasonality(&set, Period::Monthly).unwrap();
        assert_eq!(table.rows.len(), 2);

        let january = table.get(&SeasonalityKey::Month(1)).unwrap();
        assert_eq!(january.mean, 200.0);
        assert_eq!(january.count, 2);
        assert_eq!(table.rows[1].key, SeasonalityKey::Month(3));
    }

    #[test]
    fn test_means_are_whole_units() {
        let set = RecordSet::new(vec![
            SalesRecord::new(d(2024, 1, 1), "A", "c1", 10.4),
            SalesRecord::new(d(2024, 1, 1), "A", "c1", 10.5),
        ])
        .unwrap();

        let table = seasonality(&set, Period::Daily).unwrap();
        assert_eq!(table.rows[0].mean, 10.0);
    }
}
