use std::fmt;

use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::record::{RecordSet, SalesRecord};
use crate::schema::{RawRecord, RawTable};
use crate::utils::{mean, round2, sample_std};

/// Informational signal raised during ingestion. Warnings never abort
/// analysis; callers decide whether to surface them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataQualityWarning {
    /// std(amount) exceeds ten times mean(amount), which usually means a
    /// unit mix-up or a few wildly out-of-range rows.
    HighVariance { mean: f64, std: f64 },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::HighVariance { mean, std } => write!(
                f,
                "amount variance is unusually high (std {std:.2} vs mean {mean:.2})"
            ),
        }
    }
}

/// Outcome of normalizing one uploaded table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingested {
    pub records: RecordSet,
    /// Rows discarded because a required field was missing or invalid.
    pub dropped: usize,
    pub warnings: Vec<DataQualityWarning>,
}

/// Normalizes an uploaded table into the canonical record set.
///
/// Rows are dropped (never repaired) when the date does not parse, an
/// identifier trims to empty, or the amount is missing, unparsable, or
/// negative. The input table is left untouched.
pub fn ingest(table: &RawTable) -> Result<Ingested> {
    if table.is_empty() {
        return Err(AnalyticsError::EmptyDataset(
            "the uploaded table has no rows; upload data or use sample data".to_string(),
        ));
    }

    let missing = table.missing_required_columns();
    if !missing.is_empty() {
        return Err(AnalyticsError::Schema { missing });
    }

    let mut records = Vec::with_capacity(table.len());
    let mut dropped = 0usize;
    for row in &table.rows {
        match normalize_row(row) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    debug!(
        "normalized {} of {} uploaded rows ({} dropped)",
        records.len(),
        table.len(),
        dropped
    );

    if records.is_empty() {
        return Err(AnalyticsError::EmptyDataset(
            "no rows survived validation; upload data or use sample data".to_string(),
        ));
    }

    let records = RecordSet::new(records)?;

    let mut warnings = Vec::new();
    let amounts: Vec<f64> = records.iter().map(|record| record.amount).collect();
    let amount_mean = mean(&amounts);
    let amount_std = sample_std(&amounts);
    if amount_std > amount_mean * 10.0 {
        let warning = DataQualityWarning::HighVariance {
            mean: round2(amount_mean),
            std: round2(amount_std),
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    info!(
        "ingested {} records spanning {} to {}",
        records.len(),
        records.min_date(),
        records.max_date()
    );

    Ok(Ingested {
        records,
        dropped,
        warnings,
    })
}

fn normalize_row(row: &RawRecord) -> Option<SalesRecord> {
    let date = parse_date(row.date.as_deref()?)?;
    let product = required_text(row.product.as_deref()?)?;
    let customer = required_text(row.customer.as_deref()?)?;
    let amount = row.amount.as_ref()?.as_f64()?;
    if amount < 0.0 {
        return None;
    }

    Some(SalesRecord {
        date,
        product,
        customer,
        amount,
        category: optional_text(&row.category),
        region: optional_text(&row.region),
        age: row.age.as_ref().and_then(|age| age.as_f64()).and_then(to_age),
        gender: optional_text(&row.gender),
        payment_method: optional_text(&row.payment_method),
    })
}

/// Year window an accepted date must fall in. Chrono parses signed years
/// out to ±262142; month and axis arithmetic assume years well inside
/// its range.
const MIN_YEAR: i32 = 1600;
const MAX_YEAR: i32 = 9999;

/// Parses an ISO-style calendar date, tolerating slash separators and a
/// trailing time component. Dates outside `MIN_YEAR..=MAX_YEAR` count as
/// unparsable.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.split(['T', ' ']).next().unwrap_or(trimmed);

    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
}

fn required_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn optional_text(raw: &Option<String>) -> Option<String> {
    raw.as_deref().and_then(required_text)
}

fn to_age(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u32)
    } else {
        None
    }
}
