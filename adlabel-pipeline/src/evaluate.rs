//! Comparison of stored labels with a hand-labelled sample.

use crate::record::AD_ID_COLUMN;
use crate::store::ResultStore;
use crate::types::Label;
use adlabel_common::{LabelerError, Result};
use std::fs;
use std::path::Path;
use tracing::info;

pub const TRUTH_COLUMN: &str = "is_presidential";

const APPENDED_COLUMNS: [&str; 7] = [
    "id",
    "classification",
    "prompt_tokens",
    "completion_tokens",
    "total_tokens",
    "class_int",
    "error",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Rows in the labelled sample.
    pub rows: usize,
    /// Rows with both a stored result and a readable hand label.
    pub matched: usize,
    /// Matched rows where the model disagrees with the hand label.
    pub errors: usize,
}

impl Evaluation {
    /// Share of matched rows the model got right; `None` with no matches.
    pub fn accuracy(&self) -> Option<f64> {
        (self.matched > 0).then(|| 1.0 - self.errors as f64 / self.matched as f64)
    }
}

/// Left-join `labeled` with `store` on ad id and write the merged table to
/// `out`.
///
/// Every input column is kept, followed by the stored result columns,
/// `class_int` (1 for `Presidential`, else 0) and `error` (`True` when
/// `class_int` differs from `is_presidential`). Rows without a stored result
/// keep empty result columns and score `class_int = 0`.
pub fn evaluate(labeled: &Path, store: &ResultStore, out: &Path) -> Result<Evaluation> {
    let bad = |e: &dyn std::fmt::Display| {
        LabelerError::Ingest(format!("{}: {e}", labeled.display()))
    };

    let mut reader = csv::Reader::from_path(labeled).map_err(|e| bad(&e))?;
    let headers = reader.headers().map_err(|e| bad(&e))?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| bad(&format!("missing `{name}` column")))
    };
    let id_pos = column(AD_ID_COLUMN)?;
    let truth_pos = column(TRUTH_COLUMN)?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(out)?;
    writer.write_record(headers.iter().chain(APPENDED_COLUMNS))?;

    let mut eval = Evaluation::default();
    for row in reader.records() {
        let row = row.map_err(|e| bad(&e))?;
        eval.rows += 1;

        let id = row.get(id_pos).unwrap_or("").trim();
        let stored = store.get(id);
        let class_int = u8::from(stored.is_some_and(|r| r.label == Label::Presidential));
        let truth = row.get(truth_pos).and_then(parse_truth);
        let error = truth.map(|t| t != class_int);

        if let (Some(_), Some(error)) = (stored, error) {
            eval.matched += 1;
            eval.errors += usize::from(error);
        }

        let mut out_row: Vec<String> = row.iter().map(str::to_string).collect();
        match stored {
            Some(r) => out_row.extend([
                r.ad_id.clone(),
                r.label.to_string(),
                r.usage.prompt_tokens.to_string(),
                r.usage.completion_tokens.to_string(),
                r.usage.total_tokens.to_string(),
            ]),
            None => out_row.extend(std::iter::repeat(String::new()).take(5)),
        }
        out_row.push(class_int.to_string());
        out_row.push(match error {
            Some(true) => "True".to_string(),
            Some(false) => "False".to_string(),
            None => String::new(),
        });
        writer.write_record(&out_row)?;
    }
    writer.flush()?;

    info!(
        labeled = %labeled.display(),
        out = %out.display(),
        rows = eval.rows,
        matched = eval.matched,
        errors = eval.errors,
        "evaluate.done"
    );
    Ok(eval)
}

/// Hand labels come as 0/1, sometimes written as floats or booleans.
fn parse_truth(cell: &str) -> Option<u8> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Some(1),
        "0" | "0.0" | "false" | "no" => Some(0),
        _ => None,
    }
}
