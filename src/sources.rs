//! File-backed data source
//!
//! Resolves dataset names to `<root>/<name>.json` files holding an array of
//! dataset entries. Used by the CLI; services embed their own sources.

use async_trait::async_trait;
use evalstream_core::{DataSource, Dataset, Item, SourceError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// One entry in a dataset file
#[derive(Debug, Deserialize)]
struct DatasetEntry {
    input: Value,
    #[serde(default)]
    expected: Option<Value>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

/// Data source reading JSON dataset files from a directory
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DataSource for FileSource {
    async fn resolve(&self, name: &str) -> Result<Arc<Dataset>, SourceError> {
        let path = self.root.join(format!("{name}.json"));
        if !path.is_file() {
            return Err(SourceError::NotFound(name.to_string()));
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let entries: Vec<DatasetEntry> =
            serde_json::from_str(&raw).map_err(|e| SourceError::Malformed {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        if entries.is_empty() {
            return Err(SourceError::Empty(name.to_string()));
        }

        let items = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let mut item = Item::new(index, entry.input).with_metadata(entry.metadata);
                if let Some(expected) = entry.expected {
                    item = item.with_expected(expected);
                }
                item
            })
            .collect();

        tracing::debug!(dataset = %name, path = %path.display(), "dataset loaded");
        Ok(Arc::new(Dataset::new(name, items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_dataset(dir: &std::path::Path, name: &str, content: &str) {
        tokio::fs::write(dir.join(format!("{name}.json")), content)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolve_reads_items_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(
            dir.path(),
            "questions",
            r#"[
                {"input": "2+2?", "expected": "4"},
                {"input": "3+3?", "expected": "6", "metadata": {"topic": "math"}}
            ]"#,
        )
        .await;

        let source = FileSource::new(dir.path());
        let dataset = source.resolve("questions").await.unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.items[0].index, 0);
        assert_eq!(dataset.items[1].index, 1);
        assert_eq!(dataset.items[0].expected, Some(serde_json::json!("4")));
        assert_eq!(
            dataset.items[1].metadata.get("topic"),
            Some(&serde_json::json!("math"))
        );
    }

    #[tokio::test]
    async fn test_resolve_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());

        let error = source.resolve("missing").await.unwrap_err();
        assert!(matches!(error, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "empty", "[]").await;

        let source = FileSource::new(dir.path());
        let error = source.resolve("empty").await.unwrap_err();
        assert!(matches!(error, SourceError::Empty(_)));
    }

    #[tokio::test]
    async fn test_resolve_malformed_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), "broken", "{not json").await;

        let source = FileSource::new(dir.path());
        let error = source.resolve("broken").await.unwrap_err();
        assert!(matches!(error, SourceError::Malformed { .. }));
    }
}
