//! HTML field extraction for vehicle lookup result pages.
//!
//! The result page carries a details table whose rows look like
//! `<td>Label</td><td>-</td><td>Value</td>`, plus a couple of
//! `<label>Name :</label> value` pairs above it. Row labels are mapped to
//! record fields through [`LABEL_RULES`], evaluated top to bottom.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{normalize, InputKey, Record, RecordField};

/// Why a document could not be scanned at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("HTML parsing failed: empty document")]
    EmptyDocument,
    #[error("HTML parsing failed: response is not an HTML document")]
    NotHtml,
}

/// One entry of the label table: a predicate over the normalized
/// (lower-cased, trimmed) label text and the field it populates.
pub struct LabelRule {
    pub field: RecordField,
    pub matches: fn(&str) -> bool,
}

fn is_ownership(label: &str) -> bool {
    label.contains("name of the absolute ownership") || label.contains("mortgage if any")
}

fn is_engine_number(label: &str) -> bool {
    label.contains("engine number")
}

fn is_vehicle_class(label: &str) -> bool {
    label.contains("vehicle class")
}

fn is_conditions_and_notes(label: &str) -> bool {
    label.contains("conditions and notes")
}

// "Year of Manufacture" style labels must never land in `make`.
fn is_make(label: &str) -> bool {
    label.contains("make") && !label.contains("year")
}

fn is_model(label: &str) -> bool {
    label.contains("model")
}

fn is_year_of_manufacture(label: &str) -> bool {
    label.contains("year of manufacture")
}

/// Label precedence table. The first matching rule decides a row's field.
pub static LABEL_RULES: &[LabelRule] = &[
    LabelRule {
        field: RecordField::NameOfOwnership,
        matches: is_ownership,
    },
    LabelRule {
        field: RecordField::EngineNumber,
        matches: is_engine_number,
    },
    LabelRule {
        field: RecordField::VehicleClass,
        matches: is_vehicle_class,
    },
    LabelRule {
        field: RecordField::ConditionsAndNotes,
        matches: is_conditions_and_notes,
    },
    LabelRule {
        field: RecordField::Make,
        matches: is_make,
    },
    LabelRule {
        field: RecordField::Model,
        matches: is_model,
    },
    LabelRule {
        field: RecordField::YearOfManufacture,
        matches: is_year_of_manufacture,
    },
];

/// Map a raw label cell to a record field, if any rule accepts it.
pub fn match_label(label: &str) -> Option<RecordField> {
    let normalized = normalize_label(label);
    LABEL_RULES
        .iter()
        .find(|rule| (rule.matches)(&normalized))
        .map(|rule| rule.field)
}

fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static STRIPED_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.table-striped").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LABEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("label").unwrap());

static REPORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)report\s+date\s*:\s*(.*)").unwrap());
static REGISTRATION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)vehicle\s+registration\s+number\s*:\s*(.*)").unwrap());

/// Extract a record for `key` from a result page.
///
/// Never fails: documents that cannot be scanned produce a
/// `parse_failed` record carrying the reason.
pub fn extract(document: &str, key: &InputKey) -> Record {
    match try_extract(document, key) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Error parsing HTML for {}: {}", key, e);
            Record::parse_failed(key.as_str(), e.to_string())
        }
    }
}

/// Extract a record, surfacing structural failures as errors.
pub fn try_extract(document: &str, key: &InputKey) -> Result<Record, ExtractError> {
    if document.trim().is_empty() {
        return Err(ExtractError::EmptyDocument);
    }
    if !document.contains('<') {
        return Err(ExtractError::NotHtml);
    }

    let html = Html::parse_document(document);
    let mut record = Record::empty(key.as_str());

    if let Some(date) = labelled_value(&html, &REPORT_DATE) {
        record.report_date = date;
    }

    if let Some(echoed) = labelled_value(&html, &REGISTRATION_NUMBER) {
        if normalize(&echoed) != key.as_str() {
            warn!(
                "Vehicle number mismatch: requested {}, got {}",
                key, echoed
            );
        }
    }

    match find_details_table(&html) {
        Some(table) => fill_from_table(table, &mut record),
        None => debug!("No details table found for {}", key),
    }

    Ok(record)
}

/// Find the value of a `<label>Name :</label> value` pair by scanning
/// label elements and reading their parent's text.
fn labelled_value(html: &Html, pattern: &Regex) -> Option<String> {
    html.select(&LABEL)
        .filter(|label| pattern.is_match(&element_text(*label)))
        .filter_map(|label| label.parent().and_then(ElementRef::wrap))
        .find_map(|parent| {
            pattern
                .captures(&element_text(parent))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|value| !value.is_empty())
        })
}

/// Prefer the striped details table; otherwise take the first table that
/// has at least one label/value row.
fn find_details_table(html: &Html) -> Option<ElementRef<'_>> {
    html.select(&STRIPED_TABLE).next().or_else(|| {
        html.select(&TABLE)
            .find(|table| table.select(&ROW).any(|row| row_pair(row).is_some()))
    })
}

/// Split a row into (label, value) cell text. Three-cell rows carry a
/// separator in the middle; two-cell rows are a bare pair.
fn row_pair(row: ElementRef<'_>) -> Option<(String, String)> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    let value_cell = match cells.len() {
        0 | 1 => return None,
        2 => cells[1],
        _ => cells[2],
    };
    Some((element_text(cells[0]), element_text(value_cell)))
}

fn fill_from_table(table: ElementRef<'_>, record: &mut Record) {
    let mut filled: HashSet<RecordField> = HashSet::new();

    for (label, value) in table.select(&ROW).filter_map(row_pair) {
        let Some(field) = match_label(&label) else {
            continue;
        };
        // First matching row wins.
        if filled.insert(field) {
            *record.field_mut(field) = value;
        }
    }
}

/// Text content of an element with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
