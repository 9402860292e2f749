use super::{Result, read_rows, write_rows};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const HEADERS: &[&str] = &[
    "appointment_id",
    "patient_name",
    "patient_age",
    "doctor_id",
    "doctor_name",
    "specialty",
    "appointment_date",
    "slot_timing",
    "status",
    "booking_date",
    "symptoms",
];

const BOOKING_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub appointment_id: u32,
    pub patient_name: String,
    pub patient_age: u32,
    #[serde(default)]
    pub doctor_id: u32,
    pub doctor_name: String,
    pub specialty: String,
    pub appointment_date: String,
    pub slot_timing: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub booking_date: String,
    #[serde(default)]
    pub symptoms: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewAppointment {
    pub patient_name: String,
    pub patient_age: u32,
    #[serde(default)]
    pub doctor_id: u32,
    pub doctor_name: String,
    pub specialty: String,
    pub appointment_date: String,
    pub slot_timing: String,
    #[serde(default)]
    pub symptoms: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled(AppointmentRecord),
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppointmentFilter {
    /// `all` or unset matches every status.
    pub status: Option<String>,
    pub date: Option<String>,
    /// Case-insensitive substring of the doctor's name.
    pub doctor: Option<String>,
}

impl AppointmentFilter {
    fn matches(&self, record: &AppointmentRecord) -> bool {
        let status_ok = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => true,
            Some(status) => record.status.as_str().eq_ignore_ascii_case(status),
        };
        let date_ok = match self.date.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(date) => record.appointment_date == date,
        };
        let doctor_ok = match self.doctor.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(doctor) => record
                .doctor_name
                .to_lowercase()
                .contains(&doctor.to_lowercase()),
        };
        status_ok && date_ok && doctor_ok
    }
}

#[derive(Debug)]
pub struct PatientLedger {
    path: PathBuf,
    records: Vec<AppointmentRecord>,
    next_appointment_id: u32,
}

impl PatientLedger {
    /// Opens the ledger; a missing file starts an empty one that is created
    /// on the first booking.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records: Vec<AppointmentRecord> = if path.exists() {
            read_rows(&path)?
        } else {
            tracing::warn!(path = %path.display(), "patients file not found, starting empty ledger");
            Vec::new()
        };

        let next_appointment_id = records
            .iter()
            .map(|r| r.appointment_id)
            .max()
            .map_or(1, |max| max + 1);

        tracing::info!(path = %path.display(), appointments = records.len(), "patient ledger loaded");
        Ok(Self {
            path,
            records,
            next_appointment_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn book(&mut self, new: NewAppointment) -> Result<AppointmentRecord> {
        let record = AppointmentRecord {
            appointment_id: self.next_appointment_id,
            patient_name: new.patient_name.trim().to_string(),
            patient_age: new.patient_age,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            specialty: new.specialty,
            appointment_date: new.appointment_date,
            slot_timing: new.slot_timing,
            status: AppointmentStatus::Confirmed,
            booking_date: Local::now().format(BOOKING_DATE_FORMAT).to_string(),
            symptoms: new.symptoms,
        };

        self.records.push(record.clone());
        if let Err(e) = self.save() {
            self.records.pop();
            return Err(e);
        }
        self.next_appointment_id += 1;

        tracing::info!(
            appointment_id = record.appointment_id,
            patient = %record.patient_name,
            doctor = %record.doctor_name,
            doctor_id = record.doctor_id,
            "appointment booked"
        );
        Ok(record)
    }

    pub fn appointments_for(&self, patient_name: &str) -> Vec<AppointmentRecord> {
        let wanted = patient_name.trim().to_lowercase();
        self.records
            .iter()
            .filter(|r| r.patient_name.to_lowercase() == wanted)
            .cloned()
            .collect()
    }

    pub fn get(&self, appointment_id: u32) -> Option<&AppointmentRecord> {
        self.records
            .iter()
            .find(|r| r.appointment_id == appointment_id)
    }

    /// Cancelling an already-cancelled appointment succeeds again.
    pub fn cancel(&mut self, appointment_id: u32) -> Result<CancelOutcome> {
        let Some(record) = self
            .records
            .iter_mut()
            .find(|r| r.appointment_id == appointment_id)
        else {
            return Ok(CancelOutcome::NotFound);
        };

        record.status = AppointmentStatus::Cancelled;
        let cancelled = record.clone();
        self.save()?;

        tracing::info!(appointment_id, patient = %cancelled.patient_name, "appointment cancelled");
        Ok(CancelOutcome::Cancelled(cancelled))
    }

    /// Every record, latest appointment date first.
    pub fn all(&self) -> Vec<AppointmentRecord> {
        self.filter(&AppointmentFilter::default())
    }

    pub fn filter(&self, filter: &AppointmentFilter) -> Vec<AppointmentRecord> {
        let mut matching: Vec<AppointmentRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date));
        matching
    }

    pub fn save(&self) -> Result<()> {
        write_rows(&self.path, HEADERS, &self.records)
    }
}
