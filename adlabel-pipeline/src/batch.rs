//! Sequential batch driver: resume filter, rate-limited classification,
//! periodic checkpoints and the final merge into the persisted store.

use crate::classifier::AdClassifier;
use crate::rate::RateLimiter;
use crate::record::AdRecord;
use crate::store::{write_results, ResultStore};
use crate::types::{ClassificationResult, Label};
use adlabel_common::Result;
use adlabel_llm::completion::TokenUsage;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Persisted store: read before the run, rewritten after it.
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    /// Records between checkpoint writes; 0 turns checkpoints off.
    pub checkpoint_interval: usize,
    pub min_request_interval: Duration,
    /// Re-queue stored `Error` / `InvalidResponse` rows.
    pub retry_failed: bool,
    /// Cap on records classified in one run.
    pub limit: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("data/processed/ads_classified.csv"),
            checkpoint_path: PathBuf::from("data/processed/ads_classified.checkpoint.csv"),
            checkpoint_interval: 500,
            min_request_interval: Duration::from_millis(100),
            retry_failed: false,
            limit: None,
        }
    }
}

/// Records selected for one run, plus what was left out and why.
#[derive(Debug)]
pub struct WorkList<'a> {
    pub records: Vec<&'a AdRecord>,
    pub duplicate_ids: usize,
    pub skipped_existing: usize,
    pub deferred_by_limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub input_records: usize,
    pub duplicate_ids: usize,
    pub skipped_existing: usize,
    pub deferred_by_limit: usize,
    pub classified: usize,
    /// Stored rows replaced by this run's results.
    pub superseded: usize,
    /// Labels assigned in this run.
    pub labels: BTreeMap<Label, usize>,
    /// Tokens spent in this run.
    pub usage: TokenUsage,
}

impl RunSummary {
    pub fn label_line(&self) -> String {
        format_labels(&self.labels)
    }
}

pub fn format_labels(labels: &BTreeMap<Label, usize>) -> String {
    labels
        .iter()
        .map(|(label, n)| format!("{label}={n}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Prior results merged with this run's, as written to the output path.
    pub store: ResultStore,
    pub summary: RunSummary,
}

pub struct BatchDriver {
    classifier: AdClassifier,
    config: BatchConfig,
}

impl BatchDriver {
    pub fn new(classifier: AdClassifier, config: BatchConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Pick the records that still need a label. Input order is kept and
    /// the first occurrence of a repeated id wins.
    pub fn work_list<'a>(&self, records: &'a [AdRecord], prior: &ResultStore) -> WorkList<'a> {
        let done: HashSet<&str> = prior.completed_ids(self.config.retry_failed).collect();
        let mut seen = HashSet::new();
        let mut list = WorkList {
            records: Vec::new(),
            duplicate_ids: 0,
            skipped_existing: 0,
            deferred_by_limit: 0,
        };

        for record in records {
            if !seen.insert(record.id()) {
                warn!(ad_id = %record.id(), "batch.duplicate_id");
                list.duplicate_ids += 1;
            } else if done.contains(record.id()) {
                list.skipped_existing += 1;
            } else {
                list.records.push(record);
            }
        }

        if let Some(limit) = self.config.limit {
            if list.records.len() > limit {
                list.deferred_by_limit = list.records.len() - limit;
                list.records.truncate(limit);
            }
        }
        list
    }

    /// Classify every record not already in the store at `output_path`,
    /// then merge and persist.
    ///
    /// Per-record failures never abort the run; they are stored as
    /// [`Label::Error`]. Errors come back only from loading or saving the
    /// store.
    pub async fn run(&self, records: &[AdRecord]) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let prior = ResultStore::load_if_exists(&self.config.output_path)?;
        let work = self.work_list(records, &prior);
        info!(
            %run_id,
            input = records.len(),
            queued = work.records.len(),
            already_stored = work.skipped_existing,
            model = %self.classifier.model_name(),
            "batch.start"
        );

        let mut limiter = RateLimiter::per_interval(self.config.min_request_interval);
        let mut results: Vec<ClassificationResult> = Vec::with_capacity(work.records.len());

        for (i, record) in work.records.iter().enumerate() {
            limiter.acquire().await;
            let result = match AssertUnwindSafe(self.classifier.analyze(record))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    error!(
                        ad_id = %record.id(),
                        panic = %panic_message(panic.as_ref()),
                        "batch.record_panicked"
                    );
                    ClassificationResult::error(record.id())
                }
            };
            debug!(ad_id = %result.ad_id, label = %result.label, "batch.record_done");
            results.push(result);

            let n = self.config.checkpoint_interval;
            if n > 0 && (i + 1) % n == 0 {
                self.checkpoint(&results);
            }
        }

        let mut summary = RunSummary {
            input_records: records.len(),
            duplicate_ids: work.duplicate_ids,
            skipped_existing: work.skipped_existing,
            deferred_by_limit: work.deferred_by_limit,
            classified: results.len(),
            ..Default::default()
        };
        for r in &results {
            *summary.labels.entry(r.label).or_insert(0) += 1;
            summary.usage += r.usage;
        }

        let mut store = prior;
        summary.superseded = store.merge(ResultStore::from_results(results));
        store.save(&self.config.output_path)?;

        info!(
            %run_id,
            classified = summary.classified,
            skipped = summary.skipped_existing,
            deferred = summary.deferred_by_limit,
            superseded = summary.superseded,
            labels = %summary.label_line(),
            total_tokens = summary.usage.total_tokens,
            stored = store.len(),
            "batch.finished"
        );
        Ok(RunOutcome { store, summary })
    }

    fn checkpoint(&self, results: &[ClassificationResult]) {
        let path = &self.config.checkpoint_path;
        match write_results(path, results) {
            Ok(()) => info!(path = %path.display(), processed = results.len(), "batch.checkpoint.written"),
            Err(err) => warn!(path = %path.display(), error = %err, "batch.checkpoint.failed"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
