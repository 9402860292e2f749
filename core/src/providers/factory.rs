use crate::config::Config;
use crate::providers::{OllamaProvider, OpenAIProvider};
use crate::traits::Provider;
use anyhow::{Result, anyhow};
use std::sync::Arc;

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    create_provider_with_env(config, |var| std::env::var(var).ok())
}

fn create_provider_with_env<F>(config: &Config, lookup: F) -> Result<Arc<dyn Provider>>
where
    F: Fn(&str) -> Option<String>,
{
    let provider_name = config.provider_name().to_lowercase();
    tracing::info!(provider = %provider_name, model = %config.model_name(), "creating LLM provider");

    match provider_name.as_str() {
        "ollama" => {
            let mut provider = OllamaProvider::new()
                .with_model(config.model_name())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = resolve_api_key_with_fallback(
                &["OPENAI_API_KEY", "APPOINTBOT_OPENAI_API_KEY"],
                &config.api_key,
                &lookup,
            )?;
            let mut provider = OpenAIProvider::new(api_key)
                .with_model(config.model_name())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "gemini" | "google" => {
            let api_key = resolve_api_key_with_fallback(
                &["GOOGLE_API_KEY", "GEMINI_API_KEY", "APPOINTBOT_GOOGLE_API_KEY"],
                &config.api_key,
                &lookup,
            )?;
            let mut provider = OpenAIProvider::gemini(api_key)
                .with_model(config.model_name())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        _ => Err(anyhow!(
            "Unknown LLM service: {}. Available: ollama, openai, gemini",
            provider_name
        )),
    }
}

fn resolve_api_key_with_fallback<F>(env_vars: &[&str], config_key: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    for var_name in env_vars {
        if let Some(key) = lookup(var_name).filter(|k| !k.trim().is_empty()) {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found. Set {} or api_key in the config file",
            env_vars.join(" / ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(provider: &str) -> Config {
        Config {
            provider: Some(provider.to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn ollama_needs_no_key() {
        let provider = create_provider_with_env(&config_for("ollama"), |_| None).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn gemini_takes_key_from_env() {
        let provider = create_provider_with_env(&config_for("Gemini"), |var| {
            (var == "GOOGLE_API_KEY").then(|| "secret".to_string())
        })
        .unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn openai_without_key_fails() {
        let err = create_provider_with_env(&config_for("openai"), |_| None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn config_key_is_the_fallback() {
        let mut config = config_for("openai");
        config.api_key = "from-config".into();
        assert!(create_provider_with_env(&config, |_| None).is_ok());
    }

    #[test]
    fn gemini_without_model_uses_gemini_default() {
        let config = config_for("gemini");
        assert_eq!(config.model_name(), "gemini-2.0-flash");
        let provider = create_provider_with_env(&config, |var| {
            (var == "GEMINI_API_KEY").then(|| "secret".to_string())
        })
        .unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn unknown_service_lists_choices() {
        let err = create_provider_with_env(&config_for("claude"), |_| None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("ollama, openai, gemini"));
    }
}
