use thiserror::Error;

/// Error type for invalid operations.
///
/// Non-convergence of a column within its iteration budget is deliberately
/// absent: it is a diagnostic on an otherwise valid result, reported through
/// [`RunSummary`](crate::model::RunSummary), never an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrheniusError {
    #[error("Invalid grid discretization: {0}")]
    InvalidGrid(String),
    #[error("No {field} coverage at ({lat}, {lon}) level {level}")]
    MissingData {
        field: String,
        lat: f64,
        lon: f64,
        level: usize,
    },
    #[error("Unknown aggregation strategy '{identifier}' for {dimension}")]
    UnknownAggregation {
        identifier: String,
        dimension: String,
    },
    #[error("Unknown weight function '{0}'")]
    UnknownWeightFunction(String),
    #[error("Unknown data source '{identifier}' for {field}")]
    UnknownSource { identifier: String, field: String },
    #[error("Unknown vertical profile '{0}'")]
    UnknownProfile(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Numeric instability while solving cell ({lat_index}, {lon_index}): {detail}")]
    NumericInstability {
        lat_index: usize,
        lon_index: usize,
        detail: String,
    },
}

/// Convenience type for `Result<T, ArrheniusError>`.
pub type ArrheniusResult<T> = Result<T, ArrheniusError>;
