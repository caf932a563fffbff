use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::RecordSet;
use crate::utils::{days_between, quantile, round2};

/// Customer tier derived from RFM scores, ordered best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Vip,
    Preferred,
    Regular,
    NeedsFollowUp,
}

impl Segment {
    pub fn from_scores(recency: u8, frequency: u8, monetary: u8) -> Segment {
        if recency >= 3 && frequency >= 3 && monetary >= 3 {
            Segment::Vip
        } else if recency >= 3 && frequency >= 3 {
            Segment::Preferred
        } else if recency >= 2 && frequency >= 2 {
            Segment::Regular
        } else {
            Segment::NeedsFollowUp
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Vip => "VIP",
            Segment::Preferred => "Preferred",
            Segment::Regular => "Regular",
            Segment::NeedsFollowUp => "Needs follow-up",
        }
    }
}

/// One customer's recency/frequency/monetary measures with their 1-4
/// scores and the derived segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmProfile {
    /// Days between the customer's last purchase and the newest date in
    /// the whole record set.
    pub recency_days: i64,
    pub frequency: u64,
    pub monetary: f64,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    pub segment: Segment,
}

/// Scores every customer on recency, frequency, and monetary value.
///
/// Scores come from quartile bins over the customer population (recency
/// inverted, so recent buyers score high). Degenerate distributions fall
/// back deterministically: fewer than two distinct values or collapsing
/// quartile cuts score everyone 2, and a customer missing from a scored
/// dimension scores 1.
pub fn compute_rfm(records: &RecordSet) -> Result<BTreeMap<String, RfmProfile>> {
    let reference = records.max_date();

    let mut raw: BTreeMap<String, (NaiveDate, u64, f64)> = BTreeMap::new();
    for record in records {
        let entry = raw
            .entry(record.customer.clone())
            .or_insert((record.date, 0, 0.0));
        entry.0 = entry.0.max(record.date);
        entry.1 += 1;
        entry.2 += record.amount;
    }

    let recency: BTreeMap<String, f64> = raw
        .iter()
        .map(|(customer, (last, _, _))| {
            (customer.clone(), days_between(*last, reference) as f64)
        })
        .collect();
    let frequency: BTreeMap<String, f64> = raw
        .iter()
        .map(|(customer, (_, count, _))| (customer.clone(), *count as f64))
        .collect();
    let monetary: BTreeMap<String, f64> = raw
        .iter()
        .map(|(customer, (_, _, total))| (customer.clone(), *total))
        .collect();

    let recency_scores = quartile_scores(&recency, true);
    let frequency_scores = quartile_scores(&frequency, false);
    let monetary_scores = quartile_scores(&monetary, false);

    let profiles: BTreeMap<String, RfmProfile> = raw
        .into_iter()
        .map(|(customer, (last, count, total))| {
            let recency_score = recency_scores.get(&customer).copied().unwrap_or(1);
            let frequency_score = frequency_scores.get(&customer).copied().unwrap_or(1);
            let monetary_score = monetary_scores.get(&customer).copied().unwrap_or(1);

            let profile = RfmProfile {
                recency_days: days_between(last, reference),
                frequency: count,
                monetary: round2(total),
                recency_score,
                frequency_score,
                monetary_score,
                segment: Segment::from_scores(recency_score, frequency_score, monetary_score),
            };
            (customer, profile)
        })
        .collect();

    debug!("scored {} customers for RFM", profiles.len());
    Ok(profiles)
}

/// Bins values into population quartiles scored 1 (lowest quartile) to 4
/// (highest), or 4 to 1 with `reverse`. Cut points interpolate linearly
/// between observations; bin membership is right-closed.
fn quartile_scores(values: &BTreeMap<String, f64>, reverse: bool) -> BTreeMap<String, u8> {
    let neutral = |score: u8| -> BTreeMap<String, u8> {
        values.keys().map(|key| (key.clone(), score)).collect()
    };

    let mut sorted: Vec<f64> = values.values().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    if sorted.len() < 2 {
        return neutral(2);
    }

    let mut population: Vec<f64> = values.values().copied().collect();
    population.sort_by(|a, b| a.total_cmp(b));

    let edges = [
        population[0],
        quantile(&population, 0.25),
        quantile(&population, 0.5),
        quantile(&population, 0.75),
        population[population.len() - 1],
    ];
    // Collapsing cut points would leave fewer than four bins.
    if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
        return neutral(2);
    }

    values
        .iter()
        .map(|(key, &value)| {
            let bin: u8 = if value <= edges[1] {
                1
            } else if value <= edges[2] {
                2
            } else if value <= edges[3] {
                3
            } else {
                4
            };
            let score = if reverse { 5 - bin } else { bin };
            (key.clone(), score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SalesRecord;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn scores_for(values: &[(&str, f64)], reverse: bool) -> BTreeMap<String, u8> {
        let map: BTreeMap<String, f64> = values
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect();
        quartile_scores(&map, reverse)
    }

    #[test]
    fn test_quartile_scores_spread() {
        let scores = scores_for(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)], false);
        assert_eq!(scores["a"], 1);
        assert_eq!(scores["b"], 2);
        assert_eq!(scores["c"], 3);
        assert_eq!(scores["d"], 4);

        let reversed = scores_for(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)], true);
        assert_eq!(reversed["a"], 4);
        assert_eq!(reversed["d"], 1);
    }

    #[test]
    fn test_quartile_scores_degenerate_values() {
        // One distinct value: neutral 2 everywhere.
        let flat = scores_for(&[("a", 5.0), ("b", 5.0), ("c", 5.0)], false);
        assert!(flat.values().all(|&score| score == 2));

        // Two distinct values but collapsing cut points: also neutral.
        let lumpy = scores_for(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 2.0)], false);
        assert!(lumpy.values().all(|&score| score == 2));
    }

    #[test]
    fn test_single_customer_scores_neutral() {
        let set = RecordSet::new(vec![SalesRecord::new(d(2024, 1, 5), "Laptop", "solo", 100.0)])
            .unwrap();

        let profiles = compute_rfm(&set).unwrap();
        let profile = &profiles["solo"];
        assert_eq!(profile.recency_score, 2);
        assert_eq!(profile.frequency_score, 2);
        assert_eq!(profile.monetary_score, 2);
        assert_eq!(profile.recency_days, 0);
        assert_eq!(profile.frequency, 1);
    }

    #[test]
    fn test_rfm_end_to_end() {
        let mut records = Vec::new();
        // c1: one old purchase; c4: four recent ones. Frequencies and
        // totals rise together so every dimension separates cleanly.
        records.push(SalesRecord::new(d(2024, 1, 1), "A", "c1", 100.0));
        for day in [5, 10] {
            records.push(SalesRecord::new(d(2024, 1, day), "A", "c2", 200.0));
        }
        for day in [8, 14, 20] {
            records.push(SalesRecord::new(d(2024, 1, day), "A", "c3", 300.0));
        }
        for day in [12, 18, 24, 30] {
            records.push(SalesRecord::new(d(2024, 1, day), "A", "c4", 400.0));
        }
        let set = RecordSet::new(records).unwrap();

        let profiles = compute_rfm(&set).unwrap();
        assert_eq!(profiles.len(), 4);

        // Recency is measured against the newest record (2024-01-30).
        assert_eq!(profiles["c1"].recency_days, 29);
        assert_eq!(profiles["c4"].recency_days, 0);

        assert_eq!(profiles["c1"].recency_score, 1);
        assert_eq!(profiles["c4"].recency_score, 4);
        assert_eq!(profiles["c1"].frequency_score, 1);
        assert_eq!(profiles["c4"].frequency_score, 4);
        assert_eq!(profiles["c4"].monetary, 1600.0);

        assert_eq!(profiles["c4"].segment, Segment::Vip);
        assert_eq!(profiles["c3"].segment, Segment::Vip);
        assert_eq!(profiles["c2"].segment, Segment::Regular);
        assert_eq!(profiles["c1"].segment, Segment::NeedsFollowUp);
    }

    #[test]
    fn test_segment_ladder() {
        assert_eq!(Segment::from_scores(4, 4, 4), Segment::Vip);
        assert_eq!(Segment::from_scores(3, 3, 3), Segment::Vip);
        assert_eq!(Segment::from_scores(3, 3, 2), Segment::Preferred);
        assert_eq!(Segment::from_scores(3, 4, 1), Segment::Preferred);
        assert_eq!(Segment::from_scores(2, 2, 4), Segment::Regular);
        assert_eq!(Segment::from_scores(2, 1, 4), Segment::NeedsFollowUp);
        assert_eq!(Segment::from_scores(1, 1, 1), Segment::NeedsFollowUp);
        assert_eq!(Segment::NeedsFollowUp.label(), "Needs follow-up");
    }
}
