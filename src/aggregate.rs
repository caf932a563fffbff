use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::record::{RecordSet, SalesRecord};
use crate::utils::{mean, month_end, next_month_end, round2, sample_std, week_start};

/// Calendar bucket width for period-based grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Canonical bucket key for a date: the date itself, the Monday on or
    /// before it, or the last day of its month.
    pub fn bucket(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Daily => date,
            Period::Weekly => week_start(date),
            Period::Monthly => month_end(date),
        }
    }

    /// The contiguous run of bucket keys covering `start..=end`. Both
    /// endpoints are bucketed first, so the run always includes them.
    pub fn axis(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let last = self.bucket(end);
        let mut current = self.bucket(start);
        let mut keys = Vec::new();
        while current <= last {
            keys.push(current);
            current = match self {
                Period::Daily => current + Days::new(1),
                Period::Weekly => current + Days::new(7),
                Period::Monthly => next_month_end(current),
            };
        }
        keys
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

/// Grouping dimensions available on a sales record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupField {
    Product,
    Customer,
    Category,
    Region,
    Gender,
    PaymentMethod,
}

impl GroupField {
    pub fn key(&self) -> &'static str {
        match self {
            GroupField::Product => "product",
            GroupField::Customer => "customer",
            GroupField::Category => "category",
            GroupField::Region => "region",
            GroupField::Gender => "gender",
            GroupField::PaymentMethod => "payment_method",
        }
    }

    /// The record's value for this dimension, `None` when the record does
    /// not carry the attribute.
    pub fn value<'a>(&self, record: &'a SalesRecord) -> Option<&'a str> {
        match self {
            GroupField::Product => Some(&record.product),
            GroupField::Customer => Some(&record.customer),
            GroupField::Category => record.category.as_deref(),
            GroupField::Region => record.region.as_deref(),
            GroupField::Gender => record.gender.as_deref(),
            GroupField::PaymentMethod => record.payment_method.as_deref(),
        }
    }
}

/// Numeric fields an aggregation can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueField {
    Amount,
    Age,
}

impl ValueField {
    pub fn key(&self) -> &'static str {
        match self {
            ValueField::Amount => "amount",
            ValueField::Age => "age",
        }
    }

    pub fn value(&self, record: &SalesRecord) -> Option<f64> {
        match self {
            ValueField::Amount => Some(record.amount),
            ValueField::Age => record.age.map(f64::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFn {
    Sum,
    Mean,
    Count,
    Std,
    Min,
    Max,
}

impl AggFn {
    pub fn key(&self) -> &'static str {
        match self {
            AggFn::Sum => "sum",
            AggFn::Mean => "mean",
            AggFn::Count => "count",
            AggFn::Std => "std",
            AggFn::Min => "min",
            AggFn::Max => "max",
        }
    }

    /// Applies the function to a group's values. An empty slice (a group
    /// where no record carries the field) yields 0.0 across the board so
    /// result tables stay free of NaN.
    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            AggFn::Sum => values.iter().sum(),
            AggFn::Mean => mean(values),
            AggFn::Count => values.len() as f64,
            AggFn::Std => sample_std(values),
            AggFn::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggFn::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// One target field together with the functions to apply to it. The
/// resulting columns are labeled `<field>_<fn>`, e.g. `amount_sum`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggSpec {
    pub field: ValueField,
    pub fns: Vec<AggFn>,
}

impl AggSpec {
    pub fn new(field: ValueField, fns: &[AggFn]) -> Self {
        AggSpec {
            field,
            fns: fns.to_vec(),
        }
    }

    /// Sum of amount, the most common single-column request.
    pub fn amount_sum() -> Self {
        AggSpec::new(ValueField::Amount, &[AggFn::Sum])
    }
}

/// Composite key of an aggregation row. The period slot and the group
/// values stay separate typed fields; flattening to a display string is
/// the presentation layer's business via [`GroupKey::label`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub period: Option<NaiveDate>,
    pub groups: Vec<String>,
}

impl GroupKey {
    pub fn label(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.groups.len());
        if let Some(period) = self.period {
            parts.push(period.format("%Y-%m-%d").to_string());
        }
        parts.extend(self.groups.iter().cloned());
        parts.join(" / ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggRow {
    pub key: GroupKey,
    pub values: BTreeMap<String, f64>,
}

/// A grouped aggregation result: rows in natural key order (period first,
/// then group values), one column per `<field>_<fn>` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateTable {
    pub columns: Vec<String>,
    pub rows: Vec<AggRow>,
}

impl AggregateTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, key: &GroupKey) -> Option<&AggRow> {
        self.rows.iter().find(|row| &row.key == key)
    }

    pub fn value(&self, key: &GroupKey, column: &str) -> Option<f64> {
        self.row(key).and_then(|row| row.values.get(column).copied())
    }
}

/// Groups the record set by the selected dimensions (and optionally a
/// calendar period) and applies every requested aggregate.
///
/// Records missing a selected optional dimension are excluded from that
/// grouping rather than pooled under a synthetic key. A grouping that
/// matches no records yields an empty table, not an error. All values are
/// rounded to two decimals.
pub fn aggregate(
    records: &RecordSet,
    group_fields: &[GroupField],
    specs: &[AggSpec],
    period: Option<Period>,
) -> Result<AggregateTable> {
    if group_fields.is_empty() && period.is_none() {
        return Err(AnalyticsError::InvalidArgument(
            "aggregation needs at least one group field or a period bucket".to_string(),
        ));
    }
    if specs.is_empty() || specs.iter().any(|spec| spec.fns.is_empty()) {
        return Err(AnalyticsError::InvalidArgument(
            "aggregation needs at least one aggregate function".to_string(),
        ));
    }

    let mut buckets: BTreeMap<GroupKey, Vec<&SalesRecord>> = BTreeMap::new();
    'records: for record in records {
        let mut groups = Vec::with_capacity(group_fields.len());
        for field in group_fields {
            match field.value(record) {
                Some(value) => groups.push(value.to_string()),
                None => continue 'records,
            }
        }

        let key = GroupKey {
            period: period.map(|p| p.bucket(record.date)),
            groups,
        };
        buckets.entry(key).or_default().push(record);
    }

    debug!(
        "aggregated {} records into {} groups",
        records.len(),
        buckets.len()
    );

    let mut columns = Vec::new();
    for spec in specs {
        for func in &spec.fns {
            let column = format!("{}_{}", spec.field.key(), func.key());
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }

    let rows = buckets
        .into_iter()
        .map(|(key, group)| {
            let mut values = BTreeMap::new();
            for spec in specs {
                let field_values: Vec<f64> = group
                    .iter()
                    .filter_map(|record| spec.field.value(record))
                    .collect();
                for func in &spec.fns {
                    let column = format!("{}_{}", spec.field.key(), func.key());
                    values.insert(column, round2(func.apply(&field_values)));
                }
            }
            AggRow { key, values }
        })
        .collect();

    Ok(AggregateTable { columns, rows })
}
