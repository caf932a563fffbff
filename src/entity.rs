use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{RecordSet, SalesRecord};
use crate::rfm::{compute_rfm, RfmProfile};
use crate::utils::{days_between, mean, round2, sample_std};

/// The two entity dimensions with dedicated metric bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityField {
    Product,
    Customer,
}

impl EntityField {
    pub fn key(&self) -> &'static str {
        match self {
            EntityField::Product => "product",
            EntityField::Customer => "customer",
        }
    }

    fn value<'a>(&self, record: &'a SalesRecord) -> &'a str {
        match self {
            EntityField::Product => &record.product,
            EntityField::Customer => &record.customer,
        }
    }
}

/// Amount statistics for one entity across the whole record span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    pub total: f64,
    pub mean: f64,
    pub count: u64,
    pub max: f64,
    pub min: f64,
}

/// Date × entity matrix of summed amount. Dates are the distinct dates
/// that actually carry records; combinations without sales hold 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    pub dates: Vec<NaiveDate>,
    pub entities: Vec<String>,
    /// Row-major values: `values[date_index][entity_index]`.
    pub values: Vec<Vec<f64>>,
}

impl PivotTable {
    pub fn value(&self, date: NaiveDate, entity: &str) -> Option<f64> {
        let row = self.dates.iter().position(|d| *d == date)?;
        let column = self.entities.iter().position(|e| e == entity)?;
        Some(self.values[row][column])
    }

    /// Sum of one entity's column, every date included.
    pub fn column_total(&self, entity: &str) -> Option<f64> {
        let column = self.entities.iter().position(|e| e == entity)?;
        Some(self.values.iter().map(|row| row[column]).sum())
    }

    pub fn row_total(&self, date: NaiveDate) -> Option<f64> {
        let row = self.dates.iter().position(|d| *d == date)?;
        Some(self.values[row].iter().sum())
    }
}

/// Per-entity statistics plus the daily pivot for one entity dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub field: EntityField,
    pub stats: BTreeMap<String, EntityStats>,
    pub daily_pivot: PivotTable,
}

/// Purchase-rhythm measures for one customer. Monetary columns are in
/// whole currency units; the interval keeps one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerBehavior {
    pub transactions: u64,
    pub total: f64,
    pub mean: f64,
    pub std: f64,
    /// Days from first to last purchase, inclusive of both.
    pub active_span_days: i64,
    pub mean_interval_days: f64,
    /// Days between the customer's last purchase and the newest record in
    /// the set.
    pub days_since_last: i64,
}

/// The customer view: stats and pivot like any entity, plus RFM profiles
/// and purchase-rhythm behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMetrics {
    pub metrics: EntityMetrics,
    pub rfm: BTreeMap<String, RfmProfile>,
    pub behavior: BTreeMap<String, CustomerBehavior>,
}

/// Computes per-entity amount statistics (2-decimal rounding) and the
/// 0-filled date × entity pivot of daily sums.
pub fn entity_metrics(records: &RecordSet, field: EntityField) -> Result<EntityMetrics> {
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut pivot_cells: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();

    for record in records {
        let entity = field.value(record).to_string();
        grouped.entry(entity.clone()).or_default().push(record.amount);
        *pivot_cells.entry((record.date, entity)).or_insert(0.0) += record.amount;
    }

    let stats: BTreeMap<String, EntityStats> = grouped
        .into_iter()
        .map(|(entity, values)| {
            let total: f64 = values.iter().sum();
            let stats = EntityStats {
                total: round2(total),
                mean: round2(mean(&values)),
                count: values.len() as u64,
                max: round2(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                min: round2(values.iter().copied().fold(f64::INFINITY, f64::min)),
            };
            (entity, stats)
        })
        .collect();

    let mut dates: Vec<NaiveDate> = pivot_cells.keys().map(|(date, _)| *date).collect();
    dates.sort_unstable();
    dates.dedup();
    let entities: Vec<String> = stats.keys().cloned().collect();

    let values = dates
        .iter()
        .map(|date| {
            entities
                .iter()
                .map(|entity| {
                    pivot_cells
                        .get(&(*date, entity.clone()))
                        .copied()
                        .map(round2)
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect();

    debug!(
        "entity metrics over {}: {} entities, {} pivot dates",
        field.key(),
        entities.len(),
        dates.len()
    );

    Ok(EntityMetrics {
        field,
        stats,
        daily_pivot: PivotTable {
            dates,
            entities,
            values,
        },
    })
}

/// Customer statistics, RFM segmentation, and behavior in one bundle.
pub fn customer_metrics(records: &RecordSet) -> Result<CustomerMetrics> {
    let metrics = entity_metrics(records, EntityField::Customer)
        .map_err(|err| err.in_context("customer_metrics"))?;
    let rfm = compute_rfm(records).map_err(|err| err.in_context("customer_metrics"))?;
    let behavior = customer_behavior(records);

    Ok(CustomerMetrics {
        metrics,
        rfm,
        behavior,
    })
}

fn customer_behavior(records: &RecordSet) -> BTreeMap<String, CustomerBehavior> {
    let latest = records.max_date();

    let mut amounts: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut spans: BTreeMap<String, (NaiveDate, NaiveDate)> = BTreeMap::new();
    for record in records {
        amounts
            .entry(record.customer.clone())
            .or_default()
            .push(record.amount);
        let span = spans
            .entry(record.customer.clone())
            .or_insert((record.date, record.date));
        span.0 = span.0.min(record.date);
        span.1 = span.1.max(record.date);
    }

    amounts
        .into_iter()
        .map(|(customer, values)| {
            let (first, last) = spans[&customer];
            let span_days = days_between(first, last) + 1;
            let transactions = values.len() as u64;

            let behavior = CustomerBehavior {
                transactions,
                total: values.iter().sum::<f64>().round(),
                mean: mean(&values).round(),
                std: sample_std(&values).round(),
                active_span_days: span_days,
                mean_interval_days: round1(span_days as f64 / transactions as f64),
                days_since_last: days_between(last, latest),
            };
            (customer, behavior)
        })
        .collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
