use crate::agent::ToolRegistry;
use crate::records::{DoctorDirectory, PatientLedger};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod appointments;
pub mod doctors;

pub use appointments::{BookPatientAppointmentTool, CancelAppointmentTool, PatientAppointmentsTool};
pub use doctors::{BookDoctorTool, CheckAvailabilityTool, DoctorsBySpecialtyTool};

pub type SharedDirectory = Arc<Mutex<DoctorDirectory>>;
pub type SharedLedger = Arc<Mutex<PatientLedger>>;

/// Installs every booking tool the assistant can call.
pub fn register_booking_tools(
    registry: &ToolRegistry,
    directory: SharedDirectory,
    ledger: SharedLedger,
) {
    registry.register(Box::new(DoctorsBySpecialtyTool::new(directory.clone())));
    registry.register(Box::new(CheckAvailabilityTool::new(directory.clone())));
    registry.register(Box::new(BookDoctorTool::new(directory.clone())));
    registry.register(Box::new(BookPatientAppointmentTool::new(
        directory.clone(),
        ledger.clone(),
    )));
    registry.register(Box::new(PatientAppointmentsTool::new(ledger.clone())));
    registry.register(Box::new(CancelAppointmentTool::new(directory, ledger)));
}

pub(crate) fn lock<T>(store: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    store
        .lock()
        .map_err(|_| anyhow::anyhow!("record store lock poisoned"))
}

pub fn extract_string_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    extract_string_arg_opt(args, key).ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
}

/// Non-empty string argument. Numbers are accepted and rendered as text.
pub fn extract_string_arg_opt(args: &Value, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn extract_u32_arg(args: &Value, key: &str) -> anyhow::Result<u32> {
    match args.get(key) {
        None | Some(Value::Null) => Err(anyhow::anyhow!("Missing '{}' parameter", key)),
        Some(_) => extract_u32_arg_opt(args, key)?
            .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key)),
    }
}

/// Models often send integers as strings (`"3"`) or floats (`3.0`); both
/// are accepted.
pub fn extract_u32_arg_opt(args: &Value, key: &str) -> anyhow::Result<Option<u32>> {
    let parsed = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|v| u32::try_from(v).ok())
        .map(Some)
        .ok_or_else(|| anyhow::anyhow!("'{}' must be a non-negative integer", key))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub const DOCTORS: &str = "\
doctor_id,doctor_name,speciality,slot_timing,is_booked,date
1,Dr. Smith,Cardiology,09:00-10:00,False,2025-03-11
2,Dr. Patel,Cardiology,11:00-12:00,True,2025-03-11
3,Dr. Chen,Dermatology,14:00-15:00,False,2025-03-12
";

    pub fn stores(tmp: &TempDir) -> (SharedDirectory, SharedLedger) {
        let doctors = tmp.path().join("doctor.csv");
        std::fs::write(&doctors, DOCTORS).unwrap();
        let directory = DoctorDirectory::open(&doctors).unwrap();
        let ledger = PatientLedger::open(tmp.path().join("patients.csv")).unwrap();
        (Arc::new(Mutex::new(directory)), Arc::new(Mutex::new(ledger)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_accept_numbers_and_numeric_strings() {
        let args = json!({"a": 3, "b": "4", "c": 5.0, "d": "x", "e": -1, "f": null});
        assert_eq!(extract_u32_arg(&args, "a").unwrap(), 3);
        assert_eq!(extract_u32_arg(&args, "b").unwrap(), 4);
        assert_eq!(extract_u32_arg(&args, "c").unwrap(), 5);
        assert!(extract_u32_arg(&args, "d").is_err());
        assert!(extract_u32_arg(&args, "e").is_err());
        assert_eq!(extract_u32_arg_opt(&args, "f").unwrap(), None);
        assert!(
            extract_u32_arg(&args, "missing")
                .unwrap_err()
                .to_string()
                .contains("Missing 'missing'")
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let args = json!({"name": "  ", "age": 35});
        assert!(extract_string_arg(&args, "name").is_err());
        assert_eq!(extract_string_arg(&args, "age").unwrap(), "35");
    }

    #[test]
    fn registers_all_six_tools() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (directory, ledger) = test_support::stores(&tmp);
        let registry = ToolRegistry::new();
        register_booking_tools(&registry, directory, ledger);

        let names: Vec<String> = registry.get_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "get_doctors_by_specialty",
                "check_doctor_availability",
                "book_doctor_appointment",
                "book_patient_appointment",
                "get_patient_appointments",
                "cancel_appointment",
            ]
        );
    }
}
