use crate::config::Config;
use crate::providers::OpenAIProvider;
use crate::traits::Provider;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::Duration;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENAI_KEY_VARS: &[&str] = &["OPENAI_API_KEY", "PARLEY_OPENAI_API_KEY"];
const OPENROUTER_KEY_VARS: &[&str] = &["OPENROUTER_API_KEY", "PARLEY_OPENROUTER_API_KEY"];

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    let (env_vars, default_base_url): (&[&str], Option<&str>) =
        match provider_name.to_lowercase().as_str() {
            "openai" => (OPENAI_KEY_VARS, None),
            "openrouter" => (OPENROUTER_KEY_VARS, Some(OPENROUTER_BASE_URL)),
            _ => {
                return Err(anyhow!(
                    "Unknown provider: {}. Available: openai, openrouter",
                    provider_name
                ));
            }
        };

    let api_key = resolve_api_key(env_vars, &config.api_key)?;

    let mut provider = OpenAIProvider::new(api_key)
        .with_model(config.model.clone())
        .with_temperature(config.temperature)
        .with_timeout(Duration::from_secs(config.timeout_secs));
    if let Some(base_url) = config.base_url.as_deref().or(default_base_url) {
        provider = provider.with_base_url(base_url);
    }

    tracing::debug!(provider = provider_name, model = %config.model, "Provider created");
    Ok(Arc::new(provider))
}

/// Environment variables win over the key stored in the config file.
pub fn resolve_api_key(env_vars: &[&str], config_key: &str) -> Result<String> {
    resolve_api_key_with(env_vars, config_key, |name| std::env::var(name).ok())
}

fn resolve_api_key_with(
    env_vars: &[&str],
    config_key: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    for var_name in env_vars {
        if let Some(key) = lookup(var_name).filter(|k| !k.trim().is_empty()) {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found. Set {} or run 'parley onboard'.",
            env_vars.first().copied().unwrap_or("an API key variable")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_key_takes_precedence() {
        let key = resolve_api_key_with(&["A", "B"], "from-config", |name| {
            (name == "B").then(|| "from-env".to_string())
        })
        .unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn falls_back_to_config_key() {
        let key = resolve_api_key_with(&["A"], "from-config", |_| None).unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn blank_env_and_config_is_an_error() {
        let err = resolve_api_key_with(&["OPENAI_API_KEY"], "", |_| Some("  ".into())).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = Config {
            provider: Some("nope".into()),
            api_key: "k".into(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
