use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APPOINTBOT_DIR: &str = ".appointbot";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM service: `ollama`, `openai` or `gemini`.
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    /// Unset means the service's default model.
    pub model: Option<String>,
    pub temperature: f64,
    pub max_iterations: usize,
    pub max_history: usize,
    pub doctors_csv: PathBuf,
    pub patients_csv: PathBuf,
    pub checkpoint: CheckpointKind,
    /// Optional markdown file with clinic information for the system prompt.
    pub clinic_notes: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: None,
            temperature: 0.2,
            max_iterations: 20,
            max_history: 50,
            doctors_csv: PathBuf::from("./data/doctor.csv"),
            patients_csv: PathBuf::from("./data/patients.csv"),
            checkpoint: CheckpointKind::Memory,
            clinic_notes: None,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Loads the config file if present, otherwise defaults, then applies
    /// environment overrides.
    pub fn load_or_init() -> Result<Self> {
        let mut config = if config_exists() {
            load_config()?
        } else {
            Config::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or("ollama")
    }

    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model(self.provider_name()))
    }

    /// Directory holding per-thread checkpoint files.
    pub fn threads_dir(&self) -> PathBuf {
        get_appointbot_dir().join("threads")
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(service) = lookup("LLM_SERVICE").filter(|s| !s.trim().is_empty()) {
            self.provider = Some(service.trim().to_lowercase());
        }
        if let Some(model) = lookup("LLM_MODEL").filter(|s| !s.trim().is_empty()) {
            self.model = Some(model.trim().to_string());
        }
        if let Some(host) = lookup("APPOINTBOT_HOST").filter(|s| !s.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = lookup("APPOINTBOT_PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("APPOINTBOT_PORT is not a valid port: {}", port))?;
        }
        Ok(())
    }
}

pub fn default_model(service: &str) -> &'static str {
    match service.trim().to_lowercase().as_str() {
        "openai" => "gpt-4o-mini",
        "gemini" | "google" => "gemini-2.0-flash",
        _ => "llama3.2",
    }
}

pub fn get_appointbot_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(APPOINTBOT_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_appointbot_dir().join("config.toml")
}

pub fn ensure_appointbot_dir() -> Result<PathBuf> {
    let dir = get_appointbot_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create appointbot directory at {}", dir.display())
        })?;
    }

    Ok(dir)
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'appointbot onboard' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    parse_config(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_appointbot_dir()?;

    let config_path = get_config_path();
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
provider = "gemini"
model = "gemini-2.0-flash"
checkpoint = "file"
"#,
        )
        .unwrap();

        assert_eq!(config.provider_name(), "gemini");
        assert_eq!(config.model_name(), "gemini-2.0-flash");
        assert_eq!(config.checkpoint, CheckpointKind::File);
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.port, 8080);
        assert_eq!(config.patients_csv, PathBuf::from("./data/patients.csv"));
    }

    #[test]
    fn env_overrides_service_and_model() {
        let env: HashMap<&str, &str> = [
            ("LLM_SERVICE", " Ollama "),
            ("LLM_MODEL", "qwen2.5"),
            ("APPOINTBOT_PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.provider_name(), "ollama");
        assert_eq!(config.model_name(), "qwen2.5");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn service_alone_picks_its_default_model() {
        let env: HashMap<&str, &str> = [("LLM_SERVICE", "gemini")].into_iter().collect();
        let mut config = Config::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.model_name(), "gemini-2.0-flash");

        config.provider = Some("openai".into());
        assert_eq!(config.model_name(), "gpt-4o-mini");
        assert_eq!(Config::default().model_name(), "llama3.2");

        let pinned = parse_config("provider = \"gemini\"\nmodel = \"gemini-1.5-pro\"\n").unwrap();
        assert_eq!(pinned.model_name(), "gemini-1.5-pro");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|k| {
            (k == "APPOINTBOT_PORT").then(|| "eighty".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.provider = Some("openai".into());
        config.base_url = Some("http://localhost:1234/v1".into());

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = parse_config(&text).unwrap();
        assert_eq!(parsed.provider_name(), "openai");
        assert_eq!(parsed.base_url.as_deref(), Some("http://localhost:1234/v1"));
    }
}
