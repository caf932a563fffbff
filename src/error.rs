use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Schema error: missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Computation error in {context}: {source}")]
    Computation {
        context: String,
        #[source]
        source: Box<AnalyticsError>,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AnalyticsError {
    /// Wraps an error with the name of the analysis step that produced it.
    pub fn in_context(self, context: impl Into<String>) -> Self {
        AnalyticsError::Computation {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
