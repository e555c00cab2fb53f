//! Loading ad records from CSV, with a projected cache of the raw export,
//! and drawing hand-labelling samples from it.

use crate::record::{has_value, AdField, AdRecord, AD_ID_COLUMN};
use adlabel_common::{LabelerError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Columns kept in the processed cache, id first.
pub const RELEVANT_COLUMNS: [&str; 8] = [
    AD_ID_COLUMN,
    "ad_creative_bodies",
    "ad_creative_link_titles",
    "ad_delivery_start_time",
    "ad_delivery_stop_time",
    "bylines",
    "page_name",
    "transcript_translated",
];

fn ingest_err(path: &Path, err: impl std::fmt::Display) -> LabelerError {
    LabelerError::Ingest(format!("{}: {err}", path.display()))
}

/// Load records for classification.
///
/// A processed file holding every relevant column is used as is. Otherwise
/// any stale processed file is removed, the raw export is projected down to
/// [`RELEVANT_COLUMNS`] and written to `processed_path`, and the records are
/// read from that.
pub fn load_records(raw_path: &Path, processed_path: &Path) -> Result<Vec<AdRecord>> {
    if processed_path.exists() {
        if has_all_columns(processed_path)? {
            let records = read_records(processed_path)?;
            info!(path = %processed_path.display(), records = records.len(), "ingest.cache_hit");
            return Ok(records);
        }
        warn!(path = %processed_path.display(), "ingest.cache_stale");
        fs::remove_file(processed_path)?;
    }

    let rows = project(raw_path, processed_path)?;
    info!(
        raw = %raw_path.display(),
        processed = %processed_path.display(),
        rows,
        "ingest.cache_written"
    );
    read_records(processed_path)
}

fn has_all_columns(path: &Path) -> Result<bool> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ingest_err(path, e))?;
    let headers = reader.headers().map_err(|e| ingest_err(path, e))?;
    Ok(RELEVANT_COLUMNS
        .iter()
        .all(|col| headers.iter().any(|h| h == *col)))
}

fn project(raw_path: &Path, processed_path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(raw_path).map_err(|e| ingest_err(raw_path, e))?;
    let headers = reader.headers().map_err(|e| ingest_err(raw_path, e))?.clone();
    let positions: Vec<Option<usize>> = RELEVANT_COLUMNS
        .iter()
        .map(|col| headers.iter().position(|h| h == *col))
        .collect();
    if positions[0].is_none() {
        return Err(ingest_err(raw_path, format!("missing `{AD_ID_COLUMN}` column")));
    }

    if let Some(parent) = processed_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer =
        csv::Writer::from_path(processed_path).map_err(|e| ingest_err(processed_path, e))?;
    writer.write_record(RELEVANT_COLUMNS)?;

    let mut rows = 0;
    for row in reader.records() {
        let row = row.map_err(|e| ingest_err(raw_path, e))?;
        writer.write_record(
            positions
                .iter()
                .map(|pos| pos.and_then(|i| row.get(i)).unwrap_or("")),
        )?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Read every row of a CSV with an `_id` column. Columns the pipeline does
/// not know are ignored; rows with an empty id are dropped.
pub fn read_records(path: &Path) -> Result<Vec<AdRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ingest_err(path, e))?;
    let headers = reader.headers().map_err(|e| ingest_err(path, e))?.clone();
    let id_pos = headers
        .iter()
        .position(|h| h == AD_ID_COLUMN)
        .ok_or_else(|| ingest_err(path, format!("missing `{AD_ID_COLUMN}` column")))?;
    let fields: Vec<(usize, AdField)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| AdField::from_column(h).map(|f| (i, f)))
        .collect();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| ingest_err(path, e))?;
        let id = row.get(id_pos).unwrap_or("").trim();
        if id.is_empty() {
            warn!(path = %path.display(), row = line + 1, "ingest.empty_id");
            continue;
        }
        let mut record = AdRecord::new(id);
        for (i, field) in &fields {
            if let Some(cell) = row.get(*i) {
                record = record.with(*field, cell);
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Rows written by [`select_sample`], per group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounts {
    pub with_transcript: usize,
    pub without_transcript: usize,
}

/// Draw a hand-labelling sample from the raw export: up to `per_group` ads
/// with a transcript followed by up to `per_group` without, every raw column
/// kept. The same `seed` always draws the same rows.
pub fn select_sample(
    raw_path: &Path,
    out: &Path,
    per_group: usize,
    seed: u64,
) -> Result<SampleCounts> {
    let transcript_col = AdField::Transcript.column();
    let mut reader = csv::Reader::from_path(raw_path).map_err(|e| ingest_err(raw_path, e))?;
    let headers = reader.headers().map_err(|e| ingest_err(raw_path, e))?.clone();
    let transcript_pos = headers
        .iter()
        .position(|h| h == transcript_col)
        .ok_or_else(|| ingest_err(raw_path, format!("missing `{transcript_col}` column")))?;

    let (mut with, mut without) = (Vec::new(), Vec::new());
    for row in reader.records() {
        let row = row.map_err(|e| ingest_err(raw_path, e))?;
        if row.get(transcript_pos).is_some_and(has_value) {
            with.push(row);
        } else {
            without.push(row);
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let with: Vec<_> = with.choose_multiple(&mut rng, per_group).collect();
    let without: Vec<_> = without.choose_multiple(&mut rng, per_group).collect();
    if with.len() < per_group || without.len() < per_group {
        warn!(
            raw = %raw_path.display(),
            per_group,
            with_transcript = with.len(),
            without_transcript = without.len(),
            "ingest.sample_short"
        );
    }

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(out).map_err(|e| ingest_err(out, e))?;
    writer.write_record(&headers)?;
    for row in with.iter().chain(&without) {
        writer.write_record(*row)?;
    }
    writer.flush()?;

    let counts = SampleCounts {
        with_transcript: with.len(),
        without_transcript: without.len(),
    };
    info!(
        raw = %raw_path.display(),
        out = %out.display(),
        seed,
        with_transcript = counts.with_transcript,
        without_transcript = counts.without_transcript,
        "ingest.sample_written"
    );
    Ok(counts)
}
