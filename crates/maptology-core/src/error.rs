use crate::model::DataType;

/// Errors raised by session operations that the caller must handle.
///
/// Lookup failures never surface here; they are turned into notices by the
/// search controller (see [`crate::session::Notice`]).
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("no dataset loaded")]
    NoDataset,

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("'{value}' is not a selectable value of column '{column}'")]
    UnknownValue { column: String, value: String },

    #[error("unknown data type: {0} (expected one of String, Categorical, Float, Integer, Boolean, Date)")]
    UnknownDataType(String),

    #[error("cannot convert column '{column}' to {target}: value '{value}' on row {row}")]
    TypeConversion {
        column: String,
        target: DataType,
        value: String,
        row: usize,
    },

    #[error("at most {limit} ontologies can be selected")]
    OntologyLimit { limit: usize },

    #[error("dataset has no columns")]
    EmptyDataset,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MappingError>;
