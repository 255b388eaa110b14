use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("No input text provided")]
    EmptyInput,

    #[error("Required columns missing from header row: {0}")]
    MissingColumns(String),

    #[error("Invalid delimiter {0:?}: must be a single byte")]
    InvalidDelimiter(String),

    #[error("Invalid configuration for {field}: {details}")]
    InvalidConfig { field: String, details: String },

    #[error("No data to aggregate: {0}")]
    NoData(String),

    #[error("Aggregation failed: {0}")]
    Computation(String),

    #[error("Unknown column key: {0}")]
    UnknownColumn(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
