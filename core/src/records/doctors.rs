use super::{DATE_FORMAT, Result, flexible_bool, parse_date, read_rows, write_rows};
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const HEADERS: &[&str] = &[
    "doctor_id",
    "doctor_name",
    "specialty",
    "slot_timing",
    "is_booked",
    "date",
];

#[derive(Debug, Deserialize)]
struct DoctorRow {
    doctor_id: u32,
    doctor_name: String,
    #[serde(alias = "speciality")]
    specialty: String,
    #[serde(default)]
    slot_timing: String,
    #[serde(deserialize_with = "flexible_bool")]
    is_booked: bool,
    #[serde(default)]
    date: Option<String>,
}

/// One bookable slot: a doctor on a date at a slot timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSlot {
    pub doctor_id: u32,
    pub doctor_name: String,
    pub specialty: String,
    pub slot_timing: String,
    pub is_booked: bool,
    pub date: String,
}

/// The subset shown when listing doctors of a specialty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorSummary {
    pub doctor_id: u32,
    pub doctor_name: String,
    pub date: String,
    pub slot_timing: String,
}

impl From<&DoctorSlot> for DoctorSummary {
    fn from(slot: &DoctorSlot) -> Self {
        Self {
            doctor_id: slot.doctor_id,
            doctor_name: slot.doctor_name.clone(),
            date: slot.date.clone(),
            slot_timing: slot.slot_timing.clone(),
        }
    }
}

/// Filters for [`DoctorDirectory::check_availability`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Option<u32>,
    pub specialty: Option<String>,
    pub date: Option<String>,
    pub slot_timing: Option<String>,
}

#[derive(Debug)]
pub struct DoctorDirectory {
    path: PathBuf,
    slots: Vec<DoctorSlot>,
}

impl DoctorDirectory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_on(path, Local::now().date_naive())
    }

    /// Opens the directory, dating any undated slot relative to `today`.
    pub fn open_on(path: impl AsRef<Path>, today: NaiveDate) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows: Vec<DoctorRow> = read_rows(&path)?;

        let slots: Vec<DoctorSlot> = rows
            .into_iter()
            .map(|row| {
                let date = row
                    .date
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| assign_date(row.doctor_id, today));
                DoctorSlot {
                    doctor_id: row.doctor_id,
                    doctor_name: row.doctor_name,
                    specialty: row.specialty,
                    slot_timing: row.slot_timing,
                    is_booked: row.is_booked,
                    date,
                }
            })
            .collect();

        tracing::info!(path = %path.display(), slots = slots.len(), "doctor directory loaded");
        Ok(Self { path, slots })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn slots(&self) -> &[DoctorSlot] {
        &self.slots
    }

    pub fn find(&self, doctor_id: u32) -> Option<&DoctorSlot> {
        self.slots.iter().find(|s| s.doctor_id == doctor_id)
    }

    pub fn doctors_by_specialty(&self, specialty: &str) -> Vec<DoctorSummary> {
        let wanted = specialty.trim();
        self.slots
            .iter()
            .filter(|s| !s.is_booked && s.specialty.trim().eq_ignore_ascii_case(wanted))
            .map(DoctorSummary::from)
            .collect()
    }

    pub fn check_availability(&self, query: &AvailabilityQuery) -> Result<Vec<DoctorSlot>> {
        let date = query.date.as_deref().map(parse_date).transpose()?;

        Ok(self
            .slots
            .iter()
            .filter(|s| !s.is_booked)
            .filter(|s| query.doctor_id.is_none_or(|id| s.doctor_id == id))
            .filter(|s| {
                query
                    .specialty
                    .as_deref()
                    .is_none_or(|sp| s.specialty.trim().eq_ignore_ascii_case(sp.trim()))
            })
            .filter(|s| date.is_none_or(|d| parse_date(&s.date).is_ok_and(|sd| sd == d)))
            .filter(|s| {
                query
                    .slot_timing
                    .as_deref()
                    .is_none_or(|t| s.slot_timing == t)
            })
            .cloned()
            .collect())
    }

    /// Marks the first open slot of `doctor_id` booked. `None` when the id is
    /// unknown or every slot is taken.
    pub fn book(&mut self, doctor_id: u32) -> Result<Option<DoctorSlot>> {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.doctor_id == doctor_id && !s.is_booked)
        else {
            return Ok(None);
        };

        slot.is_booked = true;
        let booked = slot.clone();
        self.save()?;

        tracing::info!(doctor_id, doctor = %booked.doctor_name, date = %booked.date, "doctor slot booked");
        Ok(Some(booked))
    }

    /// Reopens a booked slot of `doctor_id`. Returns whether anything changed.
    pub fn release(&mut self, doctor_id: u32) -> Result<bool> {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.doctor_id == doctor_id && s.is_booked)
        else {
            return Ok(false);
        };

        slot.is_booked = false;
        self.save()?;

        tracing::info!(doctor_id, "doctor slot released");
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        write_rows(&self.path, HEADERS, &self.slots)
    }
}

/// Spreads undated slots over today and the next two days, keyed on the
/// doctor id so reloads agree.
fn assign_date(doctor_id: u32, today: NaiveDate) -> String {
    let offset = u64::from(doctor_id % 3);
    today
        .checked_add_days(Days::new(offset))
        .unwrap_or(today)
        .format(DATE_FORMAT)
        .to_string()
}
