use std::path::Path;

use csv::StringRecord;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::catalog::ExhibitionCatalog;
use crate::errors::PipelineError;
use crate::ledger::ProcessedFileLedger;
use crate::metrics_consts::{BATCH_ROWS_REJECTED, EXHIBITIONS_INGESTED, FILES_SKIPPED_PROCESSED};
use crate::sink::RecordSink;
use crate::types::{ExhibitionDescriptor, TransactionRecord};
use crate::validation::validate;

/// Ingests every descriptor file in `data_dir` matching `pattern` that the
/// ledger has not seen yet. Files are marked processed only after their rows
/// have been handed to the sink, so a crash mid-run re-reads rather than
/// drops; the sink's insert-or-ignore semantics make the re-read harmless.
/// Returns the number of exhibitions upserted.
pub async fn ingest_exhibitions(
    data_dir: &Path,
    pattern: &Regex,
    ledger: &dyn ProcessedFileLedger,
    sink: &dyn RecordSink,
) -> Result<usize, PipelineError> {
    let mut pending: Vec<(String, ExhibitionDescriptor)> = Vec::new();

    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !pattern.is_match(&name) {
            continue;
        }
        if ledger.contains(&name) {
            metrics::counter!(FILES_SKIPPED_PROCESSED).increment(1);
            continue;
        }
        let contents = std::fs::read_to_string(entry.path())?;
        match serde_json::from_str::<ExhibitionDescriptor>(&contents) {
            Ok(descriptor) => {
                if descriptor.derived_id().is_none() {
                    warn!(
                        file = %name,
                        external_id = %descriptor.exhibition_id,
                        "descriptor has no derivable id, skipping file"
                    );
                    continue;
                }
                pending.push((name, descriptor));
            }
            // Left unmarked so a corrected file is picked up next run.
            Err(e) => warn!(file = %name, error = %e, "malformed descriptor file, skipping"),
        }
    }

    if pending.is_empty() {
        return Ok(0);
    }

    pending.sort_by_key(|(_, descriptor)| descriptor.derived_id());
    let (files, descriptors): (Vec<String>, Vec<ExhibitionDescriptor>) =
        pending.into_iter().unzip();

    let rows: Vec<_> = descriptors
        .into_iter()
        .map(ExhibitionDescriptor::into_row)
        .collect();
    let count = rows.len();
    sink.upsert_exhibitions(rows).await?;

    for file in &files {
        ledger.mark(file)?;
    }
    metrics::counter!(EXHIBITIONS_INGESTED).increment(count as u64);
    info!(count, "ingested exhibition descriptors");
    Ok(count)
}

/// Ingests the pre-combined kiosk transaction table. Each row is lifted into
/// the same payload shape the stream delivers and pushed through the shared
/// rule chain, so batch and live data are held to identical standards.
/// Returns the number of rows accepted and upserted.
pub async fn ingest_transactions(
    combined_path: &Path,
    catalog: &ExhibitionCatalog,
    sink: &dyn RecordSink,
) -> Result<usize, PipelineError> {
    match std::fs::metadata(combined_path) {
        Ok(meta) if meta.len() == 0 => {
            warn!(path = %combined_path.display(), "combined data file is empty, nothing to do");
            return Ok(0);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %combined_path.display(), "combined data file missing, nothing to do");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
        Ok(_) => {}
    }

    let mut reader = csv::Reader::from_path(combined_path)?;
    let headers = reader.headers()?.clone();

    let mut records: Vec<TransactionRecord> = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                metrics::counter!(BATCH_ROWS_REJECTED, &[("reason", "unreadable_row")])
                    .increment(1);
                warn!(error = %e, "unreadable csv row, skipping");
                continue;
            }
        };

        let payload = row_to_payload(&headers, &row);
        match validate(&payload, catalog) {
            Ok(event) => records.push(TransactionRecord::from(event)),
            Err(reason) => {
                metrics::counter!(BATCH_ROWS_REJECTED, &[("reason", reason.label())]).increment(1);
                warn!(%reason, %payload, "rejected batch row");
            }
        }
    }

    let count = records.len();
    sink.upsert_transactions(records).await?;
    info!(count, "ingested batch transactions");
    Ok(count)
}

/// Lifts a csv row into the JSON object shape the validator expects. Header
/// names are trimmed, empty cells are treated as absent, and numeric-looking
/// cells become JSON numbers so the type and value rules see the same shapes
/// the stream delivers.
fn row_to_payload(headers: &StringRecord, row: &StringRecord) -> Value {
    let mut object = Map::new();
    for (key, field) in headers.iter().zip(row.iter()) {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let value = match field.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(field),
        };
        object.insert(key.trim().to_string(), value);
    }
    Value::Object(object)
}
