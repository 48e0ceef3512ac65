use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use super::{Dataset, DatasetError, DatasetSource};
use crate::config::EngineConfig;

type Row = Map<String, JsonValue>;

#[async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Rows in file/declaration order, at most `limit` of them.
    async fn load(&self, dataset: &Dataset, limit: Option<usize>) -> Result<Vec<Row>, DatasetError>;
}

/// Loads inline rows and CSV files stored under a base directory.
#[derive(Debug, Clone)]
pub struct FileDatasetLoader {
    base_dir: PathBuf,
}

impl FileDatasetLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.dataset_dir.clone())
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, DatasetError> {
        let rel = Path::new(relative);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.trim().is_empty() || escapes {
            return Err(DatasetError::InvalidPath(relative.to_string()));
        }
        Ok(self.base_dir.join(rel))
    }
}

#[async_trait]
impl DatasetLoader for FileDatasetLoader {
    async fn load(&self, dataset: &Dataset, limit: Option<usize>) -> Result<Vec<Row>, DatasetError> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        match &dataset.source {
            DatasetSource::Inline { rows: raw } => {
                let items = match raw {
                    JsonValue::Null => return Ok(rows),
                    JsonValue::Array(items) => items,
                    _ => return Err(DatasetError::RowsNotList),
                };
                for item in items.iter().take(limit) {
                    let row = item.as_object().ok_or(DatasetError::RowNotObject)?;
                    rows.push(project(row.clone(), &dataset.columns)?);
                }
            }
            DatasetSource::Csv { path } => {
                let full = self.resolve(path)?;
                let bytes = match tokio::fs::read(&full).await {
                    Ok(b) => b,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(DatasetError::FileNotFound(path.clone()))
                    }
                    Err(e) => return Err(e.into()),
                };
                let mut reader = csv::ReaderBuilder::new()
                    .flexible(true)
                    .from_reader(bytes.as_slice());
                let headers = reader.headers()?.clone();
                for record in reader.records().take(limit) {
                    let record = record?;
                    let row: Row = headers
                        .iter()
                        .enumerate()
                        .map(|(i, h)| {
                            let value = record
                                .get(i)
                                .map(|v| JsonValue::String(v.to_string()))
                                .unwrap_or(JsonValue::Null);
                            (h.to_string(), value)
                        })
                        .collect();
                    rows.push(project(row, &dataset.columns)?);
                }
            }
        }
        tracing::debug!(dataset = %dataset.name, rows = rows.len(), "dataset loaded");
        Ok(rows)
    }
}

fn project(row: Row, columns: &[String]) -> Result<Row, DatasetError> {
    if columns.is_empty() {
        return Ok(row);
    }
    let missing: Vec<String> = columns.iter().filter(|c| !row.contains_key(*c)).cloned().collect();
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns(missing));
    }
    Ok(columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(JsonValue::Null)))
        .collect())
}
