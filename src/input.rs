//! Loading vehicle keys from typed text and uploaded files.
//!
//! Every loader returns keys normalized and deduplicated in first-seen
//! order; blank entries are dropped.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::models::{normalize_keys, InputKey};

/// Header name that selects the key column in CSV input.
pub const KEY_COLUMN: &str = "vehicle_number";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unsupported file format: {0}. Use .csv or .txt")]
    UnsupportedFormat(String),
}

/// Split free text on commas and newlines.
pub fn parse_key_text(text: &str) -> Vec<InputKey> {
    normalize_keys(text.split(|c| c == ',' || c == '\n' || c == '\r'))
}

/// One key per line.
pub fn load_keys_from_txt(contents: &str) -> Vec<InputKey> {
    normalize_keys(contents.lines())
}

/// Keys from CSV text.
///
/// When the first row has a `vehicle_number` column that column is used
/// and the row is treated as a header. Otherwise the first column of every
/// row, including the first, is a key.
pub fn load_keys_from_csv<R: Read>(reader: R) -> Result<Vec<InputKey>, InputError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = rdr.records();
    let Some(first) = rows.next().transpose()? else {
        return Ok(Vec::new());
    };

    let header_column = first
        .iter()
        .position(|field| field.eq_ignore_ascii_case(KEY_COLUMN));

    let mut raw = Vec::new();
    let column = match header_column {
        Some(index) => index,
        None => {
            raw.extend(first.get(0).map(str::to_string));
            0
        }
    };

    for row in rows {
        let row = row?;
        raw.extend(row.get(column).map(str::to_string));
    }

    Ok(normalize_keys(raw))
}

/// Load keys from a `.csv` or `.txt` file on disk.
pub fn load_keys_from_path(path: &Path) -> Result<Vec<InputKey>, InputError> {
    let io_err = |source| InputError::Io {
        path: path.display().to_string(),
        source,
    };

    let keys = match extension(&path.to_string_lossy()).as_deref() {
        Some("csv") => load_keys_from_csv(File::open(path).map_err(io_err)?)?,
        Some("txt") => load_keys_from_txt(&std::fs::read_to_string(path).map_err(io_err)?),
        _ => return Err(InputError::UnsupportedFormat(path.display().to_string())),
    };

    info!("Loaded {} keys from {}", keys.len(), path.display());
    Ok(keys)
}

/// Load keys from an uploaded file's name and text contents.
pub fn keys_from_upload(file_name: &str, contents: &str) -> Result<Vec<InputKey>, InputError> {
    match extension(file_name).as_deref() {
        Some("csv") => load_keys_from_csv(contents.as_bytes()),
        Some("txt") => Ok(load_keys_from_txt(contents)),
        _ => Err(InputError::UnsupportedFormat(file_name.to_string())),
    }
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
