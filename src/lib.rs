//! # Sales Analytics Engine
//!
//! A library for turning raw sales transactions into validated aggregates,
//! time-series metrics, customer segments, and consistency-checked reports.
//! Uploads arrive as tolerant, optional-everything rows; ingestion filters
//! and normalizes them into a canonical record set, and every analysis
//! reads from that one set.
//!
//! ## Core Concepts
//!
//! - **Raw Table**: the upload-shaped table ([`RawTable`]) where every cell
//!   is optional and numbers may arrive as text.
//! - **Record Set**: the canonical transaction set ([`RecordSet`]), non-empty
//!   and date-sorted, produced by [`ingest`].
//! - **Aggregation**: grouped aggregate tables ([`aggregate`]) over entity
//!   dimensions and daily/weekly/monthly buckets.
//! - **Derived Metrics**: per-period statistics, entity and customer views,
//!   RFM segmentation, growth rates, moving-average trends, and seasonality.
//! - **Validation**: [`validate`] recomputes every headline figure through an
//!   independent path and reports agreement per check.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_analytics_engine::*;
//!
//! let table = sample_table(90, 10, 42);
//! let analyzer = SalesAnalyzer::from_table(&table)?;
//!
//! let growth = analyzer.growth_rates(GroupField::Product, Period::Monthly)?;
//! let report = analyzer.validate();
//! assert!(report.all_passed());
//!
//! let snapshot = AnalysisSnapshot::collect(&analyzer);
//! println!("{}", snapshot.to_json()?);
//! ```

pub mod aggregate;
pub mod cache;
pub mod entity;
pub mod error;
pub mod growth;
pub mod ingestion;
pub mod record;
pub mod rfm;
pub mod sample;
pub mod schema;
pub mod seasonality;
pub mod timeseries;
pub mod trend;
pub mod utils;
pub mod validate;

pub use aggregate::{
    aggregate, AggFn, AggRow, AggSpec, AggregateTable, GroupField, GroupKey, Period, ValueField,
};
pub use cache::AnalysisCache;
pub use entity::{
    customer_metrics, entity_metrics, CustomerBehavior, CustomerMetrics, EntityField,
    EntityMetrics, EntityStats, PivotTable,
};
pub use error::{AnalyticsError, Result};
pub use growth::{growth_rates, GrowthTable};
pub use ingestion::*;
pub use record::{DatasetSummary, RecordFilter, RecordSet, SalesRecord};
pub use rfm::{compute_rfm, RfmProfile, Segment};
pub use sample::sample_table;
pub use schema::*;
pub use seasonality::{seasonality, SeasonalityKey, SeasonalityRow, SeasonalityTable};
pub use timeseries::{time_series_metrics, PeriodStats, TimeSeriesBundle, TimeSeriesTable};
pub use trend::{trends, TrendPoint, TrendTable};
pub use utils::PCT_CHANGE_CAP;
pub use validate::{validate, CheckResult, ValidationReport};

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// One-stop entry point over a validated dataset.
///
/// Construct it once from uploaded rows (or an existing [`RecordSet`]) and
/// call whichever analyses you need; every method reads the same canonical,
/// date-sorted records, so results from different methods reconcile.
#[derive(Debug, Clone)]
pub struct SalesAnalyzer {
    records: RecordSet,
    dropped: usize,
    warnings: Vec<DataQualityWarning>,
}

impl SalesAnalyzer {
    /// Ingests an upload-shaped table and wraps the surviving records,
    /// keeping the drop count and data-quality warnings for inspection.
    pub fn from_table(table: &RawTable) -> Result<Self> {
        let Ingested {
            records,
            dropped,
            warnings,
        } = ingest(table)?;
        info!(
            "Analyzer ready: {} records spanning {} to {}",
            records.len(),
            records.min_date(),
            records.max_date()
        );
        Ok(SalesAnalyzer {
            records,
            dropped,
            warnings,
        })
    }

    /// Wraps an already validated record set.
    pub fn from_records(records: RecordSet) -> Self {
        SalesAnalyzer {
            records,
            dropped: 0,
            warnings: Vec::new(),
        }
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Rows discarded during ingestion. Zero when built from
    /// [`SalesAnalyzer::from_records`].
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn warnings(&self) -> &[DataQualityWarning] {
        &self.warnings
    }

    pub fn summary(&self) -> DatasetSummary {
        self.records.summary()
    }

    /// A new analyzer over the records matching `filter`. The original
    /// analyzer is untouched; drop counts and warnings do not carry over.
    pub fn filtered(&self, filter: &RecordFilter) -> Result<SalesAnalyzer> {
        Ok(SalesAnalyzer::from_records(self.records.filter(filter)?))
    }

    pub fn aggregate(
        &self,
        group_fields: &[GroupField],
        specs: &[AggSpec],
        period: Option<Period>,
    ) -> Result<AggregateTable> {
        aggregate::aggregate(&self.records, group_fields, specs, period)
    }

    pub fn time_series_metrics(&self) -> Result<TimeSeriesBundle> {
        timeseries::time_series_metrics(&self.records)
    }

    pub fn entity_metrics(&self, field: EntityField) -> Result<EntityMetrics> {
        entity::entity_metrics(&self.records, field)
    }

    pub fn customer_metrics(&self) -> Result<CustomerMetrics> {
        entity::customer_metrics(&self.records)
    }

    pub fn compute_rfm(&self) -> Result<BTreeMap<String, RfmProfile>> {
        rfm::compute_rfm(&self.records)
    }

    pub fn growth_rates(&self, group_field: GroupField, period: Period) -> Result<GrowthTable> {
        growth::growth_rates(&self.records, group_field, period)
    }

    pub fn trends(&self, period: Period) -> Result<TrendTable> {
        trend::trends(&self.records, period)
    }

    pub fn seasonality(&self, period: Period) -> Result<SeasonalityTable> {
        seasonality::seasonality(&self.records, period)
    }

    pub fn validate(&self) -> ValidationReport {
        validate::validate(&self.records)
    }
}

/// Every analysis the engine offers, computed in one pass over one dataset.
///
/// A component that fails leaves its field `None` and records the error
/// message under [`AnalysisSnapshot::errors`]; the remaining components
/// still run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub summary: DatasetSummary,
    pub time_series: Option<TimeSeriesBundle>,
    pub products: Option<EntityMetrics>,
    pub customers: Option<CustomerMetrics>,
    pub monthly_product_growth: Option<GrowthTable>,
    pub daily_trend: Option<TrendTable>,
    pub weekday_seasonality: Option<SeasonalityTable>,
    pub validation: ValidationReport,
    pub errors: BTreeMap<String, String>,
}

impl AnalysisSnapshot {
    /// Runs every component against the analyzer's records.
    pub fn collect(analyzer: &SalesAnalyzer) -> AnalysisSnapshot {
        let mut errors = BTreeMap::new();

        let time_series = capture(&mut errors, "time_series", analyzer.time_series_metrics());
        let products = capture(
            &mut errors,
            "products",
            analyzer.entity_metrics(EntityField::Product),
        );
        let customers = capture(&mut errors, "customers", analyzer.customer_metrics());
        let monthly_product_growth = capture(
            &mut errors,
            "growth",
            analyzer.growth_rates(GroupField::Product, Period::Monthly),
        );
        let daily_trend = capture(&mut errors, "trend", analyzer.trends(Period::Daily));
        let weekday_seasonality = capture(
            &mut errors,
            "seasonality",
            analyzer.seasonality(Period::Daily),
        );

        AnalysisSnapshot {
            summary: analyzer.summary(),
            time_series,
            products,
            customers,
            monthly_product_growth,
            daily_trend,
            weekday_seasonality,
            validation: analyzer.validate(),
            errors,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn capture<T>(
    errors: &mut BTreeMap<String, String>,
    component: &str,
    result: Result<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{} failed: {}", component, err);
            errors.insert(component.to_string(), err.to_string());
            None
        }
    }
}

/// Ingests `table` and computes the full snapshot in one call.
pub fn analyze_table(table: &RawTable) -> Result<AnalysisSnapshot> {
    let analyzer = SalesAnalyzer::from_table(table)?;
    Ok(AnalysisSnapshot::collect(&analyzer))
}

/// Computes the full snapshot over an existing record set.
pub fn analyze_records(records: RecordSet) -> AnalysisSnapshot {
    AnalysisSnapshot::collect(&SalesAnalyzer::from_records(records))
}
