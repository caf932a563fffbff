use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::schema::{RawNumber, RawRecord, RawTable};
use crate::utils::{mean, quantile, round2, sample_std};

/// One canonical, validated sales transaction. Required fields are always
/// present and well-formed once a record exists; extended attributes stay
/// optional because uploads carry them inconsistently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub product: String,
    pub customer: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl SalesRecord {
    pub fn new(
        date: NaiveDate,
        product: impl Into<String>,
        customer: impl Into<String>,
        amount: f64,
    ) -> Self {
        SalesRecord {
            date,
            product: product.into(),
            customer: customer.into(),
            amount,
            category: None,
            region: None,
            age: None,
            gender: None,
            payment_method: None,
        }
    }
}

/// The canonical record set every analysis reads from: non-empty, sorted
/// by date ascending, and immutable after construction. Serializes as a
/// plain array of records; deserialization re-runs the constructor so the
/// invariants survive a round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<SalesRecord>", into = "Vec<SalesRecord>")]
pub struct RecordSet {
    records: Vec<SalesRecord>,
    fingerprint: u64,
    min_date: NaiveDate,
    max_date: NaiveDate,
}

impl RecordSet {
    pub fn new(mut records: Vec<SalesRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(AnalyticsError::EmptyDataset(
                "no valid records to analyze; upload data or use sample data".to_string(),
            ));
        }

        // Stable sort keeps the upload order within a single day.
        records.sort_by_key(|record| record.date);

        let min_date = records[0].date;
        let max_date = records[records.len() - 1].date;
        if max_date < min_date {
            return Err(AnalyticsError::InvalidDateRange {
                start: min_date.to_string(),
                end: max_date.to_string(),
            });
        }

        let fingerprint = fingerprint_records(&records);

        Ok(RecordSet {
            records,
            fingerprint,
            min_date,
            max_date,
        })
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SalesRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; the constructor rejects empty sets. Kept so callers
    /// holding a `RecordSet` behind a generic bound read naturally.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn min_date(&self) -> NaiveDate {
        self.min_date
    }

    pub fn max_date(&self) -> NaiveDate {
        self.max_date
    }

    /// Content hash of every record in order. Two sets with the same
    /// records always share a fingerprint, which is what memoized
    /// analyses key on.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn total_amount(&self) -> f64 {
        self.records.iter().map(|record| record.amount).sum()
    }

    /// Describe-style distribution of `amount` across the whole set.
    pub fn summary(&self) -> DatasetSummary {
        let mut amounts: Vec<f64> = self.records.iter().map(|record| record.amount).collect();
        amounts.sort_by(|a, b| a.total_cmp(b));

        DatasetSummary {
            count: amounts.len(),
            mean: round2(mean(&amounts)),
            std: round2(sample_std(&amounts)),
            min: round2(amounts[0]),
            q1: round2(quantile(&amounts, 0.25)),
            median: round2(quantile(&amounts, 0.5)),
            q3: round2(quantile(&amounts, 0.75)),
            max: round2(amounts[amounts.len() - 1]),
        }
    }

    /// The flat upload-shaped form of this set. Feeding it back through
    /// ingestion reproduces the same records.
    pub fn to_raw_table(&self) -> RawTable {
        let rows = self
            .records
            .iter()
            .map(|record| RawRecord {
                date: Some(record.date.format("%Y-%m-%d").to_string()),
                product: Some(record.product.clone()),
                customer: Some(record.customer.clone()),
                amount: Some(RawNumber::Number(record.amount)),
                category: record.category.clone(),
                region: record.region.clone(),
                age: record.age.map(|age| RawNumber::Number(f64::from(age))),
                gender: record.gender.clone(),
                payment_method: record.payment_method.clone(),
            })
            .collect();

        RawTable::new(rows)
    }

    /// A new set containing only the records the filter accepts. Filtering
    /// everything away is an `EmptyDataset` error, preserving the
    /// non-empty invariant.
    pub fn filter(&self, filter: &RecordFilter) -> Result<RecordSet> {
        filter.validate()?;

        let kept: Vec<SalesRecord> = self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();

        if kept.is_empty() {
            return Err(AnalyticsError::EmptyDataset(
                "no records match the filter; widen the date span or clear selections"
                    .to_string(),
            ));
        }

        RecordSet::new(kept)
    }
}

impl TryFrom<Vec<SalesRecord>> for RecordSet {
    type Error = AnalyticsError;

    fn try_from(records: Vec<SalesRecord>) -> Result<Self> {
        RecordSet::new(records)
    }
}

impl From<RecordSet> for Vec<SalesRecord> {
    fn from(set: RecordSet) -> Self {
        set.records
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a SalesRecord;
    type IntoIter = std::slice::Iter<'a, SalesRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn fingerprint_records(records: &[SalesRecord]) -> u64 {
    let mut hasher = DefaultHasher::new();
    records.len().hash(&mut hasher);
    for record in records {
        record.date.hash(&mut hasher);
        record.product.hash(&mut hasher);
        record.customer.hash(&mut hasher);
        record.amount.to_bits().hash(&mut hasher);
        record.category.hash(&mut hasher);
        record.region.hash(&mut hasher);
        record.age.hash(&mut hasher);
        record.gender.hash(&mut hasher);
        record.payment_method.hash(&mut hasher);
    }
    hasher.finish()
}

/// Distribution of transaction amounts across a record set, matching the
/// shape of a spreadsheet "describe" panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Criteria for carving a sub-population out of a record set. `None`
/// leaves a dimension unconstrained; a list filter keeps records whose
/// value is one of the listed options, so records missing that attribute
/// are excluded once the dimension is constrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub products: Option<Vec<String>>,
    pub customers: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
    pub genders: Option<Vec<String>>,
}

impl RecordFilter {
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(AnalyticsError::InvalidDateRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }

        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(AnalyticsError::InvalidArgument(format!(
                    "min_amount {min} exceeds max_amount {max}"
                )));
            }
        }

        Ok(())
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        if let Some(start) = self.start_date {
            if record.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if record.date > end {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if record.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if record.amount > max {
                return false;
            }
        }
        if let Some(products) = &self.products {
            if !products.contains(&record.product) {
                return false;
            }
        }
        if let Some(customers) = &self.customers {
            if !customers.contains(&record.customer) {
                return false;
            }
        }
        if !optional_matches(&self.categories, &record.category) {
            return false;
        }
        if !optional_matches(&self.regions, &record.region) {
            return false;
        }
        if !optional_matches(&self.genders, &record.gender) {
            return false;
        }

        true
    }
}

fn optional_matches(allowed: &Option<Vec<String>>, value: &Option<String>) -> bool {
    match (allowed, value) {
        (None, _) => true,
        (Some(allowed), Some(value)) => allowed.contains(value),
        (Some(_), None) => false,
    }
}
