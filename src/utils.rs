use chrono::{Datelike, Days, NaiveDate};

/// Upper bound applied to percent-change values when the previous period
/// sum is zero and the current one is not. Keeps change columns free of
/// infinities while still signalling an extreme jump.
pub const PCT_CHANGE_CAP: f64 = 10_000.0;

/// The Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap()
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    last_day_of_month(date.year(), date.month())
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

pub fn next_month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    last_day_of_month(year, month)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Fewer than two
/// observations yield 0.0 so downstream tables never carry NaN.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Linear-interpolated quantile of an ascending-sorted slice: the cut sits
/// at position `(n - 1) * p`, blending the two neighbouring observations.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }

    let pos = (sorted.len() - 1) as f64 * p;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }

    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Percent change from `prev` to `current` in percentage points. A zero
/// previous value yields 0.0 when the current value is also zero, and the
/// sign-adjusted [`PCT_CHANGE_CAP`] otherwise.
pub fn pct_change(prev: f64, current: f64) -> f64 {
    if prev == 0.0 {
        if current == 0.0 {
            0.0
        } else if current > 0.0 {
            PCT_CHANGE_CAP
        } else {
            -PCT_CHANGE_CAP
        }
    } else {
        (current - prev) / prev * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_start() {
        // 2024-01-03 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(week_start(date), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        // Mondays map to themselves
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(week_start(monday), monday);

        // Sundays belong to the preceding Monday
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 12),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_next_month_end() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            next_month_end(date),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );

        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(
            next_month_end(date),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005), 1.0); // 1.005 is stored just below 1.005
        assert_eq!(round2(2.675_4), 2.68);
        assert_eq!(round2(-1.126), -1.13);
    }

    #[test]
    fn test_mean_and_sample_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-9);
        assert!((sample_std(&values) - 2.138_089_935).abs() < 1e-6);

        assert_eq!(sample_std(&[42.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-9);
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-9);
        assert!((quantile(&sorted, 0.75) - 3.25).abs() < 1e-9);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
        assert_eq!(quantile(&[7.0], 0.5), 7.0);
    }

    #[test]
    fn test_pct_change() {
        assert!((pct_change(100.0, 150.0) - 50.0).abs() < 1e-9);
        assert!((pct_change(200.0, 100.0) + 50.0).abs() < 1e-9);
        assert_eq!(pct_change(0.0, 0.0), 0.0);
        assert_eq!(pct_change(0.0, 5.0), PCT_CHANGE_CAP);
        assert_eq!(pct_change(0.0, -5.0), -PCT_CHANGE_CAP);
    }

    #[test]
    fn test_days_between() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(days_between(start, end), 90);
        assert_eq!(days_between(start, start), 0);
    }
}

pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    end.signed_duration_since(start).num_days()
}
