use anyhow::{Context, Result};
use appointbot_core::config::{CheckpointKind, Config, default_model, get_config_path};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::PathBuf;

const SERVICES: &[&str] = &["ollama", "openai", "gemini"];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_service() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select the LLM service")
        .items(SERVICES)
        .default(0)
        .interact()
        .context("Failed to select service")?;

    Ok(SERVICES[selection].to_string())
}

fn setup_model(service: &str) -> Result<String> {
    let model: String = Input::new()
        .with_prompt("Model name")
        .default(default_model(service).to_string())
        .interact_text()
        .context("Failed to read model name")?;

    Ok(model.trim().to_string())
}

fn setup_api_key(service: &str) -> Result<String> {
    if service == "ollama" {
        println!(
            "  {} Ollama runs locally, no API key needed.",
            style("✓").green()
        );
        return Ok(String::new());
    }

    let api_key = Password::new()
        .with_prompt(format!(
            "Enter your {} API key (leave empty to use the environment)",
            service
        ))
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;

    Ok(api_key.trim().to_string())
}

fn setup_records(config: &mut Config) -> Result<()> {
    let doctors: String = Input::new()
        .with_prompt("Doctors CSV")
        .default(config.doctors_csv.display().to_string())
        .interact_text()
        .context("Failed to read doctors path")?;
    let patients: String = Input::new()
        .with_prompt("Appointments CSV")
        .default(config.patients_csv.display().to_string())
        .interact_text()
        .context("Failed to read appointments path")?;

    config.doctors_csv = PathBuf::from(doctors.trim());
    config.patients_csv = PathBuf::from(patients.trim());

    if !config.doctors_csv.exists() {
        println!(
            "  {} {} does not exist yet; the assistant will find no doctors until it does.",
            style("!").yellow(),
            style(config.doctors_csv.display()).cyan()
        );
    }

    let persist = Confirm::new()
        .with_prompt("Keep conversations across restarts?")
        .default(false)
        .interact()
        .context("Failed to read checkpoint choice")?;
    config.checkpoint = if persist {
        CheckpointKind::File
    } else {
        CheckpointKind::Memory
    };

    Ok(())
}

pub fn run_onboard() -> Result<Config> {
    println!();
    println!("  {}", style("Appointment booking assistant setup").white().bold());
    println!(
        "  {}",
        style("Answer a few questions to configure the assistant.").dim()
    );

    print_step(1, 3, "LLM Service");
    let service = setup_service()?;

    print_step(2, 3, "Model & Credentials");
    let model = setup_model(&service)?;
    let api_key = setup_api_key(&service)?;

    let mut config = Config {
        provider: Some(service),
        model: Some(model),
        api_key,
        ..Default::default()
    };

    print_step(3, 3, "Records");
    setup_records(&mut config)?;

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(get_config_path().display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {} or {}",
        style("→").green(),
        style("appointbot chat").cyan().bold(),
        style("appointbot serve").cyan().bold()
    );
    println!();

    Ok(config)
}
