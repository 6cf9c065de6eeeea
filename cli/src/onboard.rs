use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use parley_core::config::Config;
use std::path::Path;

const PROVIDERS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
];

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

fn setup_provider() -> Result<usize> {
    let names: Vec<&str> = PROVIDERS.iter().map(|(name, _)| *name).collect();
    Select::new()
        .with_prompt("Select your provider")
        .items(&names)
        .default(0)
        .interact()
        .context("Failed to select provider")
}

fn setup_api_key(env_var: &str) -> Result<String> {
    if std::env::var(env_var).is_ok_and(|k| !k.trim().is_empty()) {
        println!(
            "  {} Found {} in the environment; it takes precedence over the config file.",
            style("✓").green(),
            style(env_var).cyan()
        );
        return Ok(String::new());
    }

    let api_key: String = Input::new()
        .with_prompt("Enter your API key")
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key.trim().to_string())
}

fn setup_model(provider: &str) -> Result<String> {
    let models: &[&str] = match provider {
        "openrouter" => &[
            "openai/gpt-4o-mini",
            "openai/gpt-4o",
            "anthropic/claude-sonnet-4",
        ],
        _ => &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"],
    };

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

fn setup_memory() -> Result<bool> {
    Confirm::new()
        .with_prompt("Keep the conversation between sessions?")
        .default(false)
        .interact()
        .context("Failed to read memory preference")
}

pub fn run_onboard() -> Result<Config> {
    println!("  {}", style("Welcome to parley!").white().bold());
    println!(
        "  {}",
        style("This wizard writes your chat configuration.").dim()
    );

    print_step(1, 4, "Provider");
    let provider_idx = setup_provider()?;
    let (provider, env_var) = PROVIDERS[provider_idx];

    print_step(2, 4, "API Key");
    let api_key = setup_api_key(env_var)?;

    print_step(3, 4, "Model Selection");
    let model = setup_model(provider)?;

    print_step(4, 4, "Memory");
    let persist = setup_memory()?;

    let mut config = Config {
        provider: Some(provider.to_string()),
        api_key,
        model,
        ..Default::default()
    };
    config.memory.persist = persist;

    Ok(config)
}

pub fn print_saved(config_path: &Path) {
    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(config_path.display()).cyan()
    );
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("parley chat").cyan().bold()
    );
    println!();
}
