//! Dataset rows for parameterized runs.

mod loader;

pub use loader::{DatasetLoader, FileDatasetLoader};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub source: DatasetSource,
    /// When set, rows are projected onto these columns and any row missing
    /// one of them is rejected.
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatasetSource {
    Inline {
        #[serde(default)]
        rows: JsonValue,
    },
    /// CSV with a header row, relative to the loader's base directory.
    Csv { path: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("inline dataset rows must be a list")]
    RowsNotList,
    #[error("each inline dataset row must be an object")]
    RowNotObject,
    #[error("row is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("dataset path {0:?} must stay inside the dataset directory")]
    InvalidPath(String),
    #[error("dataset file {0:?} does not exist")]
    FileNotFound(String),
    #[error("failed to read dataset file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse CSV dataset: {0}")]
    Csv(#[from] csv::Error),
}
