use crate::records::{AppointmentStatus, CancelOutcome, NewAppointment, parse_date};
use crate::tools::{
    SharedDirectory, SharedLedger, extract_string_arg, extract_string_arg_opt, extract_u32_arg,
    extract_u32_arg_opt, lock,
};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;

const MAX_PATIENT_AGE: u32 = 130;

pub struct BookPatientAppointmentTool {
    directory: SharedDirectory,
    ledger: SharedLedger,
}

impl BookPatientAppointmentTool {
    pub fn new(directory: SharedDirectory, ledger: SharedLedger) -> Self {
        Self { directory, ledger }
    }
}

#[async_trait]
impl Tool for BookPatientAppointmentTool {
    fn name(&self) -> &str {
        "book_patient_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment for a patient. Only call this once the patient's name and age \
         and the chosen doctor, date and slot are all known."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "patient_name": {"type": "string", "description": "Full name of the patient"},
                "patient_age": {"type": "integer", "description": "Age of the patient in years"},
                "doctor_id": {"type": "integer", "description": "Id of the doctor, if known"},
                "doctor_name": {"type": "string", "description": "Name of the doctor"},
                "specialty": {"type": "string", "description": "Medical specialty of the doctor"},
                "appointment_date": {"type": "string", "description": "Appointment date in YYYY-MM-DD format"},
                "slot_timing": {"type": "string", "description": "Time slot of the appointment"},
                "symptoms": {"type": "string", "description": "Symptoms or reason for the visit"}
            },
            "required": [
                "patient_name",
                "patient_age",
                "doctor_name",
                "specialty",
                "appointment_date",
                "slot_timing"
            ]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let new = NewAppointment {
            patient_name: extract_string_arg(&args, "patient_name")?,
            patient_age: extract_u32_arg(&args, "patient_age")?,
            doctor_id: extract_u32_arg_opt(&args, "doctor_id")?.unwrap_or(0),
            doctor_name: extract_string_arg(&args, "doctor_name")?,
            specialty: extract_string_arg(&args, "specialty")?,
            appointment_date: extract_string_arg(&args, "appointment_date")?,
            slot_timing: extract_string_arg(&args, "slot_timing")?,
            symptoms: extract_string_arg_opt(&args, "symptoms").unwrap_or_default(),
        };

        if new.patient_age == 0 || new.patient_age > MAX_PATIENT_AGE {
            return Ok(ToolResult::error(format!(
                "patient_age must be between 1 and {}",
                MAX_PATIENT_AGE
            )));
        }
        if let Err(e) = parse_date(&new.appointment_date) {
            return Ok(ToolResult::error(e.to_string()));
        }

        // A slot already reserved through book_doctor_appointment is fine.
        if new.doctor_id != 0 {
            let reserved = lock(&self.directory)?.book(new.doctor_id)?;
            tracing::debug!(doctor_id = new.doctor_id, reserved = reserved.is_some(), "doctor slot for booking");
        }

        let record = lock(&self.ledger)?.book(new)?;
        ToolResult::json(&record)
    }
}

pub struct PatientAppointmentsTool {
    ledger: SharedLedger,
}

impl PatientAppointmentsTool {
    pub fn new(ledger: SharedLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for PatientAppointmentsTool {
    fn name(&self) -> &str {
        "get_patient_appointments"
    }

    fn description(&self) -> &str {
        "List every appointment (confirmed and cancelled) booked under a patient's name."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "patient_name": {
                    "type": "string",
                    "description": "Full name of the patient, case-insensitive"
                }
            },
            "required": ["patient_name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let patient_name = extract_string_arg(&args, "patient_name")?;
        let appointments = lock(&self.ledger)?.appointments_for(&patient_name);
        ToolResult::json(&appointments)
    }
}

pub struct CancelAppointmentTool {
    directory: SharedDirectory,
    ledger: SharedLedger,
}

impl CancelAppointmentTool {
    pub fn new(directory: SharedDirectory, ledger: SharedLedger) -> Self {
        Self { directory, ledger }
    }
}

#[async_trait]
impl Tool for CancelAppointmentTool {
    fn name(&self) -> &str {
        "cancel_appointment"
    }

    fn description(&self) -> &str {
        "Cancel an appointment by its appointment_id. The record is kept with status \
         'cancelled' and the doctor's slot becomes available again."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "appointment_id": {
                    "type": "integer",
                    "description": "Id given to the patient when the appointment was booked"
                }
            },
            "required": ["appointment_id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let appointment_id = extract_u32_arg(&args, "appointment_id")?;

        let (outcome, was_confirmed) = {
            let mut ledger = lock(&self.ledger)?;
            let was_confirmed = ledger
                .get(appointment_id)
                .is_some_and(|r| r.status == AppointmentStatus::Confirmed);
            (ledger.cancel(appointment_id)?, was_confirmed)
        };

        let record = match outcome {
            CancelOutcome::Cancelled(record) => record,
            CancelOutcome::NotFound => {
                return ToolResult::json(&json!({
                    "status": "failed",
                    "message": "Appointment not found"
                }));
            }
        };

        let slot_released = if was_confirmed && record.doctor_id != 0 {
            lock(&self.directory)?.release(record.doctor_id)?
        } else {
            false
        };

        ToolResult::json(&json!({
            "status": "success",
            "appointment_id": record.appointment_id,
            "patient_name": record.patient_name,
            "doctor_name": record.doctor_name,
            "appointment_date": record.appointment_date,
            "slot_timing": record.slot_timing,
            "slot_released": slot_released,
            "message": "Appointment cancelled successfully"
        }))
    }
}
