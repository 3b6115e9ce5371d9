//! Per-key lookup results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome classification for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    FetchFailed,
    ParseFailed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::FetchFailed => "fetch_failed",
            Self::ParseFailed => "parse_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Registration details extracted for one vehicle.
///
/// Every attribute defaults to an empty string when the source page does
/// not carry it. Failed records always carry an `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub vehicle_number: String,
    pub report_date: String,
    pub name_of_ownership: String,
    pub engine_number: String,
    pub vehicle_class: String,
    pub conditions_and_notes: String,
    pub make: String,
    pub model: String,
    pub year_of_manufacture: String,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Create an empty successful record for a key.
    pub fn empty(vehicle_number: &str) -> Self {
        Self {
            vehicle_number: vehicle_number.to_string(),
            report_date: String::new(),
            name_of_ownership: String::new(),
            engine_number: String::new(),
            vehicle_class: String::new(),
            conditions_and_notes: String::new(),
            make: String::new(),
            model: String::new(),
            year_of_manufacture: String::new(),
            status: RecordStatus::Success,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn fetch_failed(vehicle_number: &str, error: impl Into<String>) -> Self {
        Self::failed(vehicle_number, RecordStatus::FetchFailed, error.into())
    }

    pub fn parse_failed(vehicle_number: &str, error: impl Into<String>) -> Self {
        Self::failed(vehicle_number, RecordStatus::ParseFailed, error.into())
    }

    fn failed(vehicle_number: &str, status: RecordStatus, error: String) -> Self {
        Self {
            status,
            error: Some(error),
            ..Self::empty(vehicle_number)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Mutable access to an extracted attribute.
    pub fn field_mut(&mut self, field: RecordField) -> &mut String {
        match field {
            RecordField::ReportDate => &mut self.report_date,
            RecordField::NameOfOwnership => &mut self.name_of_ownership,
            RecordField::EngineNumber => &mut self.engine_number,
            RecordField::VehicleClass => &mut self.vehicle_class,
            RecordField::ConditionsAndNotes => &mut self.conditions_and_notes,
            RecordField::Make => &mut self.make,
            RecordField::Model => &mut self.model,
            RecordField::YearOfManufacture => &mut self.year_of_manufacture,
        }
    }
}

/// The extracted string attributes of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    ReportDate,
    NameOfOwnership,
    EngineNumber,
    VehicleClass,
    ConditionsAndNotes,
    Make,
    Model,
    YearOfManufacture,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_records_carry_error() {
        let r = Record::fetch_failed("ABC1", "HTTP 500");
        assert_eq!(r.status, RecordStatus::FetchFailed);
        assert_eq!(r.error.as_deref(), Some("HTTP 500"));
        assert!(r.make.is_empty());

        let r = Record::parse_failed("ABC1", "empty document");
        assert_eq!(r.status, RecordStatus::ParseFailed);
        assert!(r.error.is_some());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(Record::fetch_failed("X", "boom")).unwrap();
        assert_eq!(json["status"], "fetch_failed");
        assert_eq!(json["error"], "boom");

        let json = serde_json::to_value(Record::empty("X")).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_status_str_matches_serde() {
        for status in [
            RecordStatus::Success,
            RecordStatus::FetchFailed,
            RecordStatus::ParseFailed,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }
}
