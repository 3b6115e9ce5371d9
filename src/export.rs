//! Result files: CSV and JSON writers, the download bundle and run summary.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::Record;

/// Column order of the CSV export.
pub const CSV_COLUMNS: [&str; 12] = [
    "vehicle_number",
    "report_date",
    "name_of_ownership",
    "engine_number",
    "vehicle_class",
    "conditions_and_notes",
    "make",
    "model",
    "year_of_manufacture",
    "status",
    "timestamp",
    "error",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Paths of one run's written result files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
}

impl ExportFiles {
    pub fn csv_name(&self) -> String {
        file_name(&self.csv)
    }

    pub fn json_name(&self) -> String {
        file_name(&self.json)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Counts over a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage of successful records, 0 when empty.
    pub success_rate: f64,
}

pub fn summarize(records: &[Record]) -> Summary {
    let total = records.len();
    let successful = records.iter().filter(|r| r.is_success()).count();
    let success_rate = if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64 * 100.0
    };
    Summary {
        total,
        successful,
        failed: total - successful,
        success_rate,
    }
}

/// Write records as CSV with a fixed header row.
pub fn write_csv<W: Write>(writer: W, records: &[Record]) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(CSV_COLUMNS)?;

    for r in records {
        let timestamp = r.timestamp.to_rfc3339();
        wtr.write_record([
            r.vehicle_number.as_str(),
            r.report_date.as_str(),
            r.name_of_ownership.as_str(),
            r.engine_number.as_str(),
            r.vehicle_class.as_str(),
            r.conditions_and_notes.as_str(),
            r.make.as_str(),
            r.model.as_str(),
            r.year_of_manufacture.as_str(),
            r.status.as_str(),
            timestamp.as_str(),
            r.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write records as a pretty-printed JSON array.
pub fn write_json<W: Write>(mut writer: W, records: &[Record]) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// Base name for a run's result files, e.g. `vehicle_results_20240301_101500`.
pub fn results_stem(at: DateTime<Local>) -> String {
    format!("vehicle_results_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Write both CSV and JSON files into `dir`, creating it if needed.
pub fn write_results(dir: &Path, records: &[Record]) -> Result<ExportFiles, ExportError> {
    std::fs::create_dir_all(dir)?;
    let stem = results_stem(Local::now());
    let files = ExportFiles {
        csv: dir.join(format!("{}.csv", stem)),
        json: dir.join(format!("{}.json", stem)),
    };

    write_csv(BufWriter::new(File::create(&files.csv)?), records)?;
    write_json(BufWriter::new(File::create(&files.json)?), records)?;

    info!(
        "Saved {} records to {} and {}",
        records.len(),
        files.csv.display(),
        files.json.display()
    );
    Ok(files)
}

/// Deflated in-memory ZIP holding a run's CSV and JSON files.
pub fn zip_bundle(files: &ExportFiles) -> Result<Vec<u8>, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in [&files.csv, &files.json] {
        let contents = std::fs::read(path)?;
        zip.start_file(file_name(path), options)?;
        zip.write_all(&contents)?;
    }

    Ok(zip.finish()?.into_inner())
}
