//! Append-only Parquet snapshots, one per processed report.
//!
//! Each file holds the provenance columns followed by the known report
//! columns, and repeats the provenance in the file's key/value metadata so a
//! snapshot can be traced back to its email and Drive upload on its own.

use crate::error::{ReportError, Result};
use crate::report::sheet::{ColumnKind, ReportSheet, REPORT_COLUMNS};
use crate::types::{Provenance, ReportKind};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const PROVENANCE_COLUMNS: [&str; 10] = [
    "report_id",
    "report_type",
    "report_date",
    "processed_timestamp",
    "source_filename",
    "email_id",
    "email_sender",
    "email_subject",
    "gdrive_file_id",
    "gdrive_folder_path",
];

const METADATA_PREFIX: &str = "ov.";
const CONTENT_HASH_KEY: &str = "ov.content_sha256";

/// A single value read back from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum LakeValue {
    Null,
    Text(String),
    Number(f64),
}

/// Rows of one snapshot file, in `snapshot_schema` column order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<LakeValue>>,
    pub metadata: HashMap<String, String>,
}

impl Snapshot {
    pub fn provenance(&self) -> Provenance {
        let get = |k: &str| {
            self.metadata
                .get(&format!("{}{}", METADATA_PREFIX, k))
                .cloned()
                .unwrap_or_default()
        };
        Provenance {
            report_id: get("report_id"),
            report_type: get("report_type"),
            report_date: get("report_date"),
            processed_timestamp: get("processed_timestamp"),
            source_filename: get("source_filename"),
            email_id: get("email_id"),
            email_sender: get("email_sender"),
            email_subject: get("email_subject"),
            gdrive_file_id: Some(get("gdrive_file_id")).filter(|s| !s.is_empty()),
            gdrive_folder_path: get("gdrive_folder_path"),
        }
    }

    pub fn content_sha256(&self) -> Option<&str> {
        self.metadata.get(CONTENT_HASH_KEY).map(String::as_str)
    }
}

/// Every snapshot column name, provenance first.
pub fn snapshot_columns() -> Vec<&'static str> {
    PROVENANCE_COLUMNS
        .iter()
        .copied()
        .chain(REPORT_COLUMNS.iter().map(|c| c.name))
        .collect()
}

pub fn snapshot_schema() -> SchemaRef {
    let mut fields: Vec<Field> = PROVENANCE_COLUMNS
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, *name == "gdrive_file_id"))
        .collect();
    fields.extend(REPORT_COLUMNS.iter().map(|c| match c.kind {
        ColumnKind::Text => Field::new(c.name, DataType::Utf8, true),
        ColumnKind::Number => Field::new(c.name, DataType::Float64, true),
    }));
    Arc::new(Schema::new(fields))
}

fn provenance_values(p: &Provenance) -> [Option<&str>; 10] {
    [
        Some(p.report_id.as_str()),
        Some(p.report_type.as_str()),
        Some(p.report_date.as_str()),
        Some(p.processed_timestamp.as_str()),
        Some(p.source_filename.as_str()),
        Some(p.email_id.as_str()),
        Some(p.email_sender.as_str()),
        Some(p.email_subject.as_str()),
        p.gdrive_file_id.as_deref(),
        Some(p.gdrive_folder_path.as_str()),
    ]
}

/// One record batch holding the whole sheet; absent columns become nulls.
pub fn build_batch(sheet: &ReportSheet, provenance: &Provenance) -> Result<RecordBatch> {
    let rows = sheet.row_count();
    let mut columns: Vec<ArrayRef> = provenance_values(provenance)
        .iter()
        .map(|v| Arc::new(StringArray::from(vec![*v; rows])) as ArrayRef)
        .collect();

    for column in REPORT_COLUMNS.iter() {
        let array: ArrayRef = match column.kind {
            ColumnKind::Text => Arc::new(StringArray::from(
                sheet
                    .text_column(column.name)
                    .unwrap_or_else(|| vec![None; rows]),
            )),
            ColumnKind::Number => Arc::new(Float64Array::from(
                sheet
                    .numeric_column(column.name)
                    .unwrap_or_else(|| vec![None; rows]),
            )),
        };
        columns.push(array);
    }

    let extra = sheet.unexpected_columns();
    if !extra.is_empty() {
        debug!("Dropping columns not in the snapshot layout: {:?}", extra);
    }

    Ok(RecordBatch::try_new(snapshot_schema(), columns)?)
}

fn writer_properties(provenance: &Provenance, content_sha256: Option<&str>) -> WriterProperties {
    let mut key_values: Vec<KeyValue> = PROVENANCE_COLUMNS
        .iter()
        .zip(provenance_values(provenance))
        .map(|(k, v)| KeyValue {
            key: format!("{}{}", METADATA_PREFIX, k),
            value: v.map(str::to_string),
        })
        .collect();
    if let Some(hash) = content_sha256 {
        key_values.push(KeyValue {
            key: CONTENT_HASH_KEY.to_string(),
            value: Some(hash.to_string()),
        });
    }
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_created_by("ov_reports".to_string())
        .set_key_value_metadata(Some(key_values))
        .build()
}

/// `<kind>-<report_date>-<YYYYMMDDTHHMMSS>.parquet`, suffixed until unused.
fn snapshot_path(lake_dir: &Path, provenance: &Provenance, processed_at: DateTime<Utc>) -> PathBuf {
    let stem = format!(
        "{}-{}-{}",
        provenance.report_type,
        provenance.report_date,
        processed_at.format("%Y%m%dT%H%M%S")
    );
    let mut path = lake_dir.join(format!("{}.parquet", stem));
    let mut n = 1;
    while path.exists() {
        path = lake_dir.join(format!("{}-{}.parquet", stem, n));
        n += 1;
    }
    path
}

/// Writes a new snapshot; existing snapshots are never replaced.
pub fn write_snapshot(
    lake_dir: &Path,
    sheet: &ReportSheet,
    provenance: &Provenance,
    processed_at: DateTime<Utc>,
    content_sha256: Option<&str>,
) -> Result<PathBuf> {
    fs::create_dir_all(lake_dir)?;
    let batch = build_batch(sheet, provenance)?;
    let path = snapshot_path(lake_dir, provenance, processed_at);

    // Readers only glob *.parquet, so a partial write is never picked up
    let tmp_path = path.with_extension("parquet.tmp");
    {
        let file = File::create(&tmp_path)?;
        let props = writer_properties(provenance, content_sha256);
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
    }
    fs::rename(&tmp_path, &path)?;

    info!(
        "Wrote {} rows to data lake snapshot {}",
        batch.num_rows(),
        path.display()
    );
    Ok(path)
}

fn is_processed_stamp(segment: &str) -> bool {
    segment.len() == 15
        && segment
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 8 { b == b'T' } else { b.is_ascii_digit() })
}

/// Processing stamp and collision suffix of a snapshot file name:
/// `…-20251012T163000.parquet` is `("20251012T163000", 0)`, `…-20251012T163000-2.parquet`
/// is `("20251012T163000", 2)`. Names that don't follow the layout sort first.
pub fn snapshot_sequence(file_name: &str) -> (String, u32) {
    let stem = file_name.strip_suffix(".parquet").unwrap_or(file_name);
    let mut segments = stem.rsplit('-');
    let last = segments.next().unwrap_or_default();
    if is_processed_stamp(last) {
        return (last.to_string(), 0);
    }
    match (last.parse::<u32>(), segments.next()) {
        (Ok(suffix), Some(stamp)) if is_processed_stamp(stamp) => (stamp.to_string(), suffix),
        _ => (String::new(), 0),
    }
}

/// Newest `<kind>-*.parquet` by modification time. Equal times fall back to
/// the processing stamp and collision suffix in the name.
pub fn latest_snapshot(lake_dir: &Path, kind: ReportKind) -> Result<Option<PathBuf>> {
    if !lake_dir.exists() {
        return Ok(None);
    }
    let prefix = format!("{}-", kind.as_str());
    let mut best: Option<(std::time::SystemTime, (String, u32), String, PathBuf)> = None;

    for entry in fs::read_dir(lake_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || !name.ends_with(".parquet") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let candidate = (modified, snapshot_sequence(&name), name, entry.path());
        let newer = match &best {
            Some((m, seq, n, _)) => (candidate.0, &candidate.1, &candidate.2) > (*m, seq, n),
            None => true,
        };
        if newer {
            best = Some(candidate);
        }
    }
    Ok(best.map(|(_, _, _, path)| path))
}

fn column_values(array: &dyn Array, name: &str) -> Result<Vec<LakeValue>> {
    match array.data_type() {
        DataType::Utf8 => {
            let strings = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| ReportError::MissingField(format!("utf8 column {}", name)))?;
            Ok((0..strings.len())
                .map(|i| {
                    if strings.is_null(i) {
                        LakeValue::Null
                    } else {
                        LakeValue::Text(strings.value(i).to_string())
                    }
                })
                .collect())
        }
        DataType::Float64 => {
            let numbers = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| ReportError::MissingField(format!("float64 column {}", name)))?;
            Ok((0..numbers.len())
                .map(|i| {
                    if numbers.is_null(i) {
                        LakeValue::Null
                    } else {
                        LakeValue::Number(numbers.value(i))
                    }
                })
                .collect())
        }
        other => Err(ReportError::MissingField(format!(
            "supported type for column {} (found {})",
            name, other
        ))),
    }
}

pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let metadata = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .map(|kvs| {
            kvs.iter()
                .filter(|kv| kv.key.starts_with(METADATA_PREFIX))
                .filter_map(|kv| kv.value.clone().map(|v| (kv.key.clone(), v)))
                .collect()
        })
        .unwrap_or_default();
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let mut rows = Vec::new();
    for batch in builder.build()? {
        let batch = batch?;
        let per_column = batch
            .columns()
            .iter()
            .zip(&columns)
            .map(|(array, name)| column_values(array.as_ref(), name))
            .collect::<Result<Vec<_>>>()?;
        for row in 0..batch.num_rows() {
            rows.push(per_column.iter().map(|col| col[row].clone()).collect());
        }
    }

    Ok(Snapshot {
        columns,
        rows,
        metadata,
    })
}
