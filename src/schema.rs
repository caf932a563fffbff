use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Column names that every usable upload must populate.
pub const REQUIRED_COLUMNS: [&str; 4] = ["date", "product", "customer", "amount"];

/// A numeric cell as it arrives from an upload: spreadsheets and CSV
/// exports deliver numbers and numeric strings interchangeably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    /// Coerces the cell to `f64`. Unparsable text yields `None`, the same
    /// as a missing cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawNumber::Number(n) if n.is_finite() => Some(*n),
            RawNumber::Number(_) => None,
            RawNumber::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        RawNumber::Number(value)
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

/// One uploaded row, before any validation. Every field is optional so a
/// ragged upload still deserializes; normalization decides what survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawRecord {
    #[serde(default)]
    #[schemars(description = "Transaction date as an ISO-8601 string (YYYY-MM-DD). A trailing time component is tolerated and ignored.")]
    pub date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Product identifier or display name. Leading/trailing whitespace is trimmed; rows whose product trims to empty are dropped.")]
    pub product: Option<String>,

    #[serde(default)]
    #[schemars(description = "Customer identifier or display name. Leading/trailing whitespace is trimmed; rows whose customer trims to empty are dropped.")]
    pub customer: Option<String>,

    #[serde(default)]
    #[schemars(description = "Sale amount in currency units. Accepts a number or a numeric string; negative or unparsable amounts cause the row to be dropped.")]
    pub amount: Option<RawNumber>,

    #[serde(default)]
    #[schemars(description = "Optional product category for category-level grouping.")]
    pub category: Option<String>,

    #[serde(default)]
    #[schemars(description = "Optional sales region for regional grouping.")]
    pub region: Option<String>,

    #[serde(default)]
    #[schemars(description = "Optional customer age in years. Accepts a number or a numeric string.")]
    pub age: Option<RawNumber>,

    #[serde(default)]
    #[schemars(description = "Optional customer gender label, kept verbatim for demographic grouping.")]
    pub gender: Option<String>,

    #[serde(default)]
    #[schemars(description = "Optional payment method label (e.g. 'credit card', 'cash').")]
    pub payment_method: Option<String>,
}

/// The flat uploaded table: a plain array of rows on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RawTable {
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(rows: Vec<RawRecord>) -> Self {
        RawTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Required columns that no row populates at all. A column that is
    /// present in some rows and absent in others is not reported here;
    /// those gaps are handled row by row during normalization.
    pub fn missing_required_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|column| {
                self.rows.iter().all(|row| match **column {
                    "date" => row.date.is_none(),
                    "product" => row.product.is_none(),
                    "customer" => row.customer.is_none(),
                    "amount" => row.amount.is_none(),
                    _ => false,
                })
            })
            .map(|column| column.to_string())
            .collect()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RawTable)
    }

    /// Machine-readable schema of the upload format, for collaborators
    /// that validate files before handing them over.
    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

impl From<Vec<RawRecord>> for RawTable {
    fn from(rows: Vec<RawRecord>) -> Self {
        RawTable { rows }
    }
}
