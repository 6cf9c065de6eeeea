use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const PARLEY_DIR: &str = ".parley";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub max_messages: usize,
    /// Keep the conversation on disk under the workspace directory.
    pub persist: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: 10,
            persist: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub max_tool_rounds: usize,
    pub system_message: Option<String>,
    pub memory: MemoryConfig,
    pub stream: StreamConfig,
    #[serde(skip)]
    pub workspace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: crate::providers::openai::DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            timeout_secs: 120,
            max_tool_rounds: 20,
            system_message: None,
            memory: MemoryConfig::default(),
            stream: StreamConfig::default(),
            workspace_dir: get_parley_dir().join("workspace"),
        }
    }
}

pub fn get_parley_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(PARLEY_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_parley_dir().join("config.toml")
}

pub fn ensure_parley_dir() -> Result<PathBuf> {
    let parley_dir = get_parley_dir();

    if !parley_dir.exists() {
        std::fs::create_dir_all(&parley_dir).with_context(|| {
            format!(
                "Failed to create parley directory at {}",
                parley_dir.display()
            )
        })?;
    }

    Ok(parley_dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Invalid config TOML")?;
        config.validate()?;
        config.workspace_dir = get_parley_dir().join("workspace");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory.enabled && self.memory.max_messages == 0 {
            anyhow::bail!("memory.max_messages must be at least 1");
        }
        if self.max_tool_rounds == 0 {
            anyhow::bail!("max_tool_rounds must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("temperature must be between 0.0 and 2.0");
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'parley onboard' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_parley_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
