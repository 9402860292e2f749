//! Conversational doctor-appointment booking: an LLM agent loop that calls
//! booking tools over CSV-backed records and remembers each conversation
//! thread.

pub mod agent;
pub mod config;
pub mod memory;
pub mod providers;
pub mod records;
pub mod tools;
pub mod traits;

pub use agent::{AgentLoop, ContextBuilder, ToolRegistry};
pub use config::{CheckpointKind, Config};
pub use memory::{FileCheckpointer, InMemoryCheckpointer, create_checkpointer};
pub use providers::{OllamaProvider, OpenAIProvider, create_provider};
pub use records::{DoctorDirectory, PatientLedger, RecordsError};
pub use tools::{SharedDirectory, SharedLedger, register_booking_tools};
pub use traits::{
    ChatMessage, ChatRequest, ChatResponse, Checkpointer, Provider, Tool, ToolCall, ToolResult,
    ToolSpec,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_exports_build_a_default_setup() {
        let config = Config::default();
        assert_eq!(config.checkpoint, CheckpointKind::Memory);
        assert_eq!(create_checkpointer(&config).unwrap().name(), "memory");
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");
    }
}
