//! CSV-backed doctor and appointment records.
//!
//! Every mutation rewrites the whole file. Callers share a store behind a
//! mutex; there is no cross-process locking.

pub mod doctors;
pub mod patients;

pub use doctors::{AvailabilityQuery, DoctorDirectory, DoctorSlot, DoctorSummary};
pub use patients::{
    AppointmentFilter, AppointmentRecord, AppointmentStatus, CancelOutcome, NewAppointment,
    PatientLedger,
};

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("date must be in YYYY-MM-DD format, got '{0}'")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, RecordsError>;

pub fn parse_date(value: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| RecordsError::InvalidDate(value.to_string()))
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> RecordsError + '_ {
    move |source| RecordsError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn read_rows<T>(path: &Path) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error(path))?;

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(csv_error(path))
}

fn write_rows<T>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()>
where
    T: serde::Serialize,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RecordsError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error(path))?;

    writer.write_record(headers).map_err(csv_error(path))?;
    for row in rows {
        writer.serialize(row).map_err(csv_error(path))?;
    }
    writer.flush().map_err(|source| RecordsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Accepts `True`/`False` as written by spreadsheet tools as well as
/// `true`/`false`/`1`/`0`. Empty cells are `false`.
fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean, got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_rejects_other_formats() {
        assert!(parse_date("2025-03-09").is_ok());
        assert!(matches!(
            parse_date("09/03/2025"),
            Err(RecordsError::InvalidDate(_))
        ));
        assert!(parse_date("2025-02-30").is_err());
    }
}
