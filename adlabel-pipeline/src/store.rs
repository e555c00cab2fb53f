//! Persisted classification results, one CSV row per ad id.
//!
//! Columns: `id, classification, prompt_tokens, completion_tokens,
//! total_tokens`. Rows are written in id order so reruns produce stable
//! files.

use crate::types::{ClassificationResult, Label};
use adlabel_common::{LabelerError, Result};
use adlabel_llm::completion::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct StoreRow {
    id: String,
    classification: Label,
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl From<&ClassificationResult> for StoreRow {
    fn from(r: &ClassificationResult) -> Self {
        Self {
            id: r.ad_id.clone(),
            classification: r.label,
            prompt_tokens: r.usage.prompt_tokens,
            completion_tokens: r.usage.completion_tokens,
            total_tokens: r.usage.total_tokens,
        }
    }
}

impl From<StoreRow> for ClassificationResult {
    fn from(row: StoreRow) -> Self {
        Self {
            ad_id: row.id,
            label: row.classification,
            usage: TokenUsage {
                prompt_tokens: row.prompt_tokens,
                completion_tokens: row.completion_tokens,
                total_tokens: row.total_tokens,
            },
        }
    }
}

/// Results keyed by ad id; at most one entry per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultStore {
    rows: BTreeMap<String, ClassificationResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later results replace earlier ones with the same id.
    pub fn from_results(results: impl IntoIterator<Item = ClassificationResult>) -> Self {
        let mut store = Self::new();
        for r in results {
            store.insert(r);
        }
        store
    }

    /// Returns the replaced result, if any.
    pub fn insert(&mut self, result: ClassificationResult) -> Option<ClassificationResult> {
        self.rows.insert(result.ad_id.clone(), result)
    }

    pub fn get(&self, ad_id: &str) -> Option<&ClassificationResult> {
        self.rows.get(ad_id)
    }

    pub fn contains(&self, ad_id: &str) -> bool {
        self.rows.contains_key(ad_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.rows.values()
    }

    /// Fold `newer` into this store; on an id collision the newer result
    /// wins. Returns how many existing rows were replaced.
    ///
    /// ```
    /// use adlabel_pipeline::{ClassificationResult, Label, ResultStore};
    /// use adlabel_pipeline::types::Classification;
    ///
    /// let old = Classification { label: Label::Other, usage: Default::default() };
    /// let new = Classification { label: Label::Presidential, usage: Default::default() };
    ///
    /// let mut store = ResultStore::from_results([ClassificationResult::new("A", old)]);
    /// let replaced = store.merge(ResultStore::from_results([
    ///     ClassificationResult::new("A", new),
    ///     ClassificationResult::new("B", old),
    /// ]));
    ///
    /// assert_eq!(replaced, 1);
    /// assert_eq!(store.get("A").map(|r| r.label), Some(Label::Presidential));
    /// assert_eq!(store.len(), 2);
    /// ```
    pub fn merge(&mut self, newer: ResultStore) -> usize {
        newer
            .rows
            .into_values()
            .filter_map(|r| self.insert(r))
            .count()
    }

    /// Ids a resumed run should skip. With `retry_failed`, rows labelled
    /// `Error` or `InvalidResponse` are left out so they get another try.
    pub fn completed_ids(&self, retry_failed: bool) -> impl Iterator<Item = &str> {
        self.rows
            .values()
            .filter(move |r| !(retry_failed && r.label.is_failure()))
            .map(|r| r.ad_id.as_str())
    }

    pub fn label_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for r in self.rows.values() {
            *counts.entry(r.label).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_usage(&self) -> TokenUsage {
        let mut usage = TokenUsage::default();
        for r in self.rows.values() {
            usage += r.usage;
        }
        usage
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| LabelerError::Store(format!("open {}: {e}", path.display())))?;
        let mut store = Self::new();
        for (line, row) in reader.deserialize::<StoreRow>().enumerate() {
            let row = row.map_err(|e| {
                LabelerError::Store(format!("{} row {}: {e}", path.display(), line + 1))
            })?;
            store.insert(row.into());
        }
        debug!(path = %path.display(), rows = store.len(), "store.loaded");
        Ok(store)
    }

    /// Empty store when nothing has been persisted yet.
    pub fn load_if_exists(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the whole store to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_results(path, self.rows.values())?;
        info!(path = %path.display(), rows = self.len(), "store.saved");
        Ok(())
    }
}

/// Write `results` in store format via a sibling temp file and a rename.
/// Also used for checkpoints, which may hold repeated ids.
pub fn write_results<'a>(
    path: &Path,
    results: impl IntoIterator<Item = &'a ClassificationResult>,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let written = (|| -> Result<()> {
        let mut writer = csv::Writer::from_path(&tmp)?;
        for r in results {
            writer.serialize(StoreRow::from(r))?;
        }
        writer.flush()?;
        Ok(())
    })();
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;
    use tempfile::TempDir;

    fn result(id: &str, label: Label, total: u64) -> ClassificationResult {
        ClassificationResult::new(
            id,
            Classification {
                label,
                usage: TokenUsage {
                    prompt_tokens: total.saturating_sub(1),
                    completion_tokens: 1.min(total),
                    total_tokens: total,
                },
            },
        )
    }

    #[test]
    fn save_then_load_preserves_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/out.csv");
        let store = ResultStore::from_results([
            result("2", Label::Other, 120),
            result("1", Label::Presidential, 300),
            result("3", Label::Error, 0),
        ]);

        store.save(&path).unwrap();
        let loaded = ResultStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert!(!temp_path(&path).exists());

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,classification,prompt_tokens,completion_tokens,total_tokens")
        );
        assert_eq!(lines.next(), Some("1,Presidential,299,1,300"));
    }

    #[test]
    fn duplicate_rows_in_a_file_keep_the_last() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dup.csv");
        fs::write(
            &path,
            "id,classification,prompt_tokens,completion_tokens,total_tokens\n\
             A,Other,1,1,2\n\
             A,Unsure,3,1,4\n",
        )
        .unwrap();
        let store = ResultStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("A").unwrap().label, Label::Unsure);
    }

    #[test]
    fn unknown_label_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.csv");
        fs::write(
            &path,
            "id,classification,prompt_tokens,completion_tokens,total_tokens\nA,Maybe,0,0,0\n",
        )
        .unwrap();
        let err = ResultStore::load(&path).unwrap_err();
        assert!(matches!(err, LabelerError::Store(_)), "{err}");
    }

    #[test]
    fn missing_file_loads_as_empty_only_when_optional() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("none.csv");
        assert!(ResultStore::load_if_exists(&path).unwrap().is_empty());
        assert!(ResultStore::load(&path).is_err());
    }

    #[test]
    fn completed_ids_can_requeue_failures() {
        let store = ResultStore::from_results([
            result("A", Label::Other, 5),
            result("B", Label::Error, 0),
            result("C", Label::InvalidResponse, 5),
        ]);
        let all: Vec<_> = store.completed_ids(false).collect();
        assert_eq!(all, vec!["A", "B", "C"]);
        let kept: Vec<_> = store.completed_ids(true).collect();
        assert_eq!(kept, vec!["A"]);
    }

    #[test]
    fn counts_and_usage_cover_every_row() {
        let store = ResultStore::from_results([
            result("A", Label::Other, 5),
            result("B", Label::Other, 7),
            result("C", Label::Presidential, 10),
        ]);
        let counts = store.label_counts();
        assert_eq!(counts.get(&Label::Other), Some(&2));
        assert_eq!(counts.get(&Label::Presidential), Some(&1));
        assert_eq!(store.total_usage().total_tokens, 22);
    }
}
