use anyhow::{Context, Result};
use appointbot_core::{
    AgentLoop, Config, ContextBuilder, DoctorDirectory, PatientLedger, SharedLedger, ToolRegistry,
    create_checkpointer, create_provider, register_booking_tools,
};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Everything a front end needs: the agent and the appointment ledger it
/// writes to.
pub struct App {
    pub agent: Arc<AgentLoop>,
    pub ledger: SharedLedger,
}

pub fn build(config: &Config) -> Result<App> {
    let directory = DoctorDirectory::open(&config.doctors_csv).with_context(|| {
        format!(
            "Could not load doctors from {}",
            config.doctors_csv.display()
        )
    })?;
    let ledger = PatientLedger::open(&config.patients_csv).with_context(|| {
        format!(
            "Could not load appointments from {}",
            config.patients_csv.display()
        )
    })?;
    info!(
        doctors = directory.slots().len(),
        appointments = ledger.len(),
        "records loaded"
    );

    let directory = Arc::new(Mutex::new(directory));
    let ledger = Arc::new(Mutex::new(ledger));

    let tool_registry = Arc::new(ToolRegistry::new());
    register_booking_tools(&tool_registry, directory, ledger.clone());

    let mut context_builder = ContextBuilder::new();
    if let Some(notes) = &config.clinic_notes {
        context_builder = context_builder.with_clinic_notes(notes);
    }

    let provider = create_provider(config)?;
    let checkpointer = create_checkpointer(config)?;
    info!(
        provider = provider.name(),
        model = config.model_name(),
        checkpoint = checkpointer.name(),
        "agent ready"
    );

    let agent = AgentLoop::new(provider, context_builder, tool_registry, checkpointer)
        .with_max_iterations(config.max_iterations)
        .with_max_history(config.max_history);

    Ok(App {
        agent: Arc::new(agent),
        ledger,
    })
}
