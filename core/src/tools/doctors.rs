use crate::records::{AvailabilityQuery, RecordsError};
use crate::tools::{SharedDirectory, extract_string_arg, extract_string_arg_opt, extract_u32_arg, extract_u32_arg_opt, lock};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;

pub struct DoctorsBySpecialtyTool {
    directory: SharedDirectory,
}

impl DoctorsBySpecialtyTool {
    pub fn new(directory: SharedDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for DoctorsBySpecialtyTool {
    fn name(&self) -> &str {
        "get_doctors_by_specialty"
    }

    fn description(&self) -> &str {
        "Find doctors with an open slot in a medical specialty (e.g. Cardiology, Dermatology). \
         Returns doctor_id, doctor_name, date and slot_timing for each open slot."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "specialty": {
                    "type": "string",
                    "description": "Medical specialty to search for, case-insensitive"
                }
            },
            "required": ["specialty"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let specialty = extract_string_arg(&args, "specialty")?;
        let doctors = lock(&self.directory)?.doctors_by_specialty(&specialty);
        tracing::debug!(%specialty, found = doctors.len(), "doctors by specialty");
        ToolResult::json(&doctors)
    }
}

pub struct CheckAvailabilityTool {
    directory: SharedDirectory,
}

impl CheckAvailabilityTool {
    pub fn new(directory: SharedDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &str {
        "check_doctor_availability"
    }

    fn description(&self) -> &str {
        "Check open appointment slots. All filters are optional and combine; \
         with no filters every open slot is returned."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_id": {
                    "type": "integer",
                    "description": "Only slots of this doctor"
                },
                "specialty": {
                    "type": "string",
                    "description": "Medical specialty, case-insensitive"
                },
                "date": {
                    "type": "string",
                    "description": "Date in YYYY-MM-DD format"
                },
                "slot_timing": {
                    "type": "string",
                    "description": "Exact slot timing, e.g. 09:00-10:00"
                }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let query = AvailabilityQuery {
            doctor_id: extract_u32_arg_opt(&args, "doctor_id")?,
            specialty: extract_string_arg_opt(&args, "specialty"),
            date: extract_string_arg_opt(&args, "date"),
            slot_timing: extract_string_arg_opt(&args, "slot_timing"),
        };

        let result = lock(&self.directory)?.check_availability(&query);
        match result {
            Ok(slots) => ToolResult::json(&slots),
            Err(e @ RecordsError::InvalidDate(_)) => Ok(ToolResult::error(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct BookDoctorTool {
    directory: SharedDirectory,
}

impl BookDoctorTool {
    pub fn new(directory: SharedDirectory) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for BookDoctorTool {
    fn name(&self) -> &str {
        "book_doctor_appointment"
    }

    fn description(&self) -> &str {
        "Reserve the open slot of a doctor by doctor_id so nobody else can take it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_id": {
                    "type": "integer",
                    "description": "Id of the doctor whose slot to reserve"
                }
            },
            "required": ["doctor_id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let doctor_id = extract_u32_arg(&args, "doctor_id")?;

        match lock(&self.directory)?.book(doctor_id)? {
            Some(slot) => ToolResult::json(&slot),
            None => Ok(ToolResult::error(format!(
                "Doctor {} has no open slot (unknown id or already booked)",
                doctor_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::stores;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_open_doctors_as_json() {
        let tmp = TempDir::new().unwrap();
        let (directory, _) = stores(&tmp);
        let tool = DoctorsBySpecialtyTool::new(directory);

        let result = tool.execute(json!({"specialty": "cardiology"})).await.unwrap();
        assert!(result.success);
        let doctors: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(doctors.as_array().unwrap().len(), 1);
        assert_eq!(doctors[0]["doctor_name"], "Dr. Smith");
        assert_eq!(doctors[0]["date"], "2025-03-11");
    }

    #[tokio::test]
    async fn missing_specialty_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let (directory, _) = stores(&tmp);
        let tool = DoctorsBySpecialtyTool::new(directory);
        assert!(tool.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn availability_filters_and_validates_date() {
        let tmp = TempDir::new().unwrap();
        let (directory, _) = stores(&tmp);
        let tool = CheckAvailabilityTool::new(directory);

        let all = tool.execute(json!({})).await.unwrap();
        let slots: Vec<serde_json::Value> = serde_json::from_str(&all.output).unwrap();
        assert_eq!(slots.len(), 2);

        let by_date = tool.execute(json!({"date": "2025-03-12", "doctor_id": "3"})).await.unwrap();
        let slots: Vec<serde_json::Value> = serde_json::from_str(&by_date.output).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0]["specialty"], "Dermatology");
        assert_eq!(slots[0]["is_booked"], false);

        let bad = tool.execute(json!({"date": "12/03/2025"})).await.unwrap();
        assert!(!bad.success);
        assert!(bad.error.unwrap().contains("YYYY-MM-DD"));
    }

    #[tokio::test]
    async fn booking_a_taken_slot_fails_softly() {
        let tmp = TempDir::new().unwrap();
        let (directory, _) = stores(&tmp);
        let tool = BookDoctorTool::new(directory.clone());

        let ok = tool.execute(json!({"doctor_id": 1})).await.unwrap();
        assert!(ok.success);
        assert!(directory.lock().unwrap().find(1).unwrap().is_booked);

        let again = tool.execute(json!({"doctor_id": 1})).await.unwrap();
        assert!(!again.success);
        let taken = tool.execute(json!({"doctor_id": 2})).await.unwrap();
        assert!(!taken.success);
    }
}
