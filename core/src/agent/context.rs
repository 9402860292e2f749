use crate::traits::{ChatMessage, ToolSpec};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const NOTES_MAX_CHARS: usize = 20_000;

const ASSISTANT_PERSONA: &str = "You are a medical appointment booking assistant for a clinic.

Be polite, calm and caring.

When the user describes a problem or symptoms, ask follow-up questions and remember the symptoms. \
If the symptoms sound serious, or the user asks for an appointment, recommend the matching specialist \
and offer to book. Once they agree, collect the remaining details.

## Tool rules

- Never promise an action for later. If an action is needed, call the tool in this same response.
- As soon as the user agrees to book, call get_doctors_by_specialty without announcing it first.
- Show doctors as a markdown table (id, name, date, slot).
- If a doctor has several dates or slots, ask which one the user wants.
- Call book_patient_appointment only when the patient's name and age and the chosen doctor, \
date and slot are all known.

## Responsibilities

- Find doctors by specialty and check their availability.
- Book appointments with the patient's details.
- Show a patient's appointment history and cancel appointments by id.

## Booking workflow

1. Symptoms → pick the specialty.
2. get_doctors_by_specialty → show the open doctors.
3. User picks a doctor → ask for patient name and age if unknown.
4. book_patient_appointment → complete the booking.
5. Confirm the appointment id, doctor, date and slot back to the user.

Required patient details: full name and age. Symptoms are optional but helpful.

Do not reply with things like \"I will find doctors for you\" or \"Let me search for specialists\"; \
do it instead.";

/// Builds the system prompt sent ahead of every model call. The prompt is
/// rebuilt per call and never stored with the thread.
pub struct ContextBuilder {
    pub tool_specs: Vec<ToolSpec>,
    pub clinic_notes: Option<PathBuf>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            tool_specs: vec![],
            clinic_notes: None,
        }
    }

    pub fn with_tool_specs(mut self, tool_specs: Vec<ToolSpec>) -> Self {
        self.tool_specs = tool_specs;
        self
    }

    /// Free-form clinic information (hours, address, policies) appended to
    /// the prompt when the file exists.
    pub fn with_clinic_notes(mut self, path: impl AsRef<Path>) -> Self {
        self.clinic_notes = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build_system_prompt(&self) -> String {
        let mut parts = vec![ASSISTANT_PERSONA.to_string()];

        if let Some(notes) = self.load_clinic_notes() {
            parts.push(notes);
        }

        let tools = self.get_tool_instructions();
        if !tools.is_empty() {
            parts.push(tools);
        }

        parts.push(self.get_runtime_context());
        parts.join("\n\n---\n\n")
    }

    /// Some local models ignore native function calling, so the prompt also
    /// describes a tagged text protocol the agent loop understands.
    fn get_tool_instructions(&self) -> String {
        if self.tool_specs.is_empty() {
            return String::new();
        }

        let mut instructions = String::new();
        instructions.push_str("## Tool Use Protocol\n\n");
        instructions.push_str(
            "Prefer native function calls. If they are unavailable, wrap a JSON object in <tool_call> tags:\n\n",
        );
        instructions.push_str("```\n<tool_call>\n{\"name\": \"tool_name\", \"arguments\": {\"param\": \"value\"}}\n</tool_call>\n```\n\n");
        instructions.push_str("Example: the user says \"show me cardiologists\". Respond with:\n<tool_call>\n{\"name\":\"get_doctors_by_specialty\",\"arguments\":{\"specialty\":\"Cardiology\"}}\n</tool_call>\n\n");
        instructions.push_str("Tool results come back in <tool_result> tags. ");
        instructions
            .push_str("Continue with the results until you can give the user a final answer.\n\n");
        instructions.push_str("### Available Tools\n\n");

        for tool in &self.tool_specs {
            let _ = writeln!(
                instructions,
                "**{}**: {}\nParameters: `{}`\n",
                tool.name, tool.description, tool.parameters_schema
            );
        }

        instructions
    }

    fn get_runtime_context(&self) -> String {
        let today = chrono::Local::now().format("%Y-%m-%d (%A)");

        format!(
            "## Runtime Context\n\n### Today\n{}\n\nDates passed to tools use the YYYY-MM-DD format.",
            today
        )
    }

    fn load_clinic_notes(&self) -> Option<String> {
        let path = self.clinic_notes.as_ref()?;
        let content = std::fs::read_to_string(path).ok()?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return None;
        }

        let body = if trimmed.chars().count() > NOTES_MAX_CHARS {
            let truncated: String = trimmed.chars().take(NOTES_MAX_CHARS).collect();
            format!("{}\n\n[... truncated at {} chars]", truncated, NOTES_MAX_CHARS)
        } else {
            trimmed.to_string()
        };

        Some(format!("## Clinic Notes\n\n{}", body))
    }

    /// `[system] + history`, ready for a model call.
    pub fn build_messages(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(self.build_system_prompt()));
        messages.extend(history.iter().filter(|m| !m.is_system()).cloned());
        messages
    }
}
