//! Configuration file management for lessonforge.
//!
//! Provides a TOML-based config file at `~/.config/lessonforge/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lessonforge_core::orchestrator::{GeneratorConfig, Strategy};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

pub const ENV_API_URL: &str = "LESSONFORGE_API_URL";
pub const ENV_API_KEY: &str = "LESSONFORGE_API_KEY";
pub const ENV_MODEL: &str = "LESSONFORGE_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "LESSONFORGE_TIMEOUT_SECS";
pub const ENV_OFFLINE: &str = "LESSONFORGE_OFFLINE";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the lessonforge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/lessonforge` or
/// `~/.config/lessonforge`, never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("lessonforge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("lessonforge")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file may hold an API key, so it is made owner-only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Settings given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    /// `--offline` can only switch offline mode on.
    pub offline: bool,
    pub strategy: Option<Strategy>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonforgeConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub offline: bool,
    pub strategy: Strategy,
}

impl LessonforgeConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = if config_path().exists() {
            load_config()?
        } else {
            ConfigFile::default()
        };
        Self::resolve_with(cli, &file)
    }

    fn resolve_with(cli: &CliOverrides, file: &ConfigFile) -> Result<Self> {
        let api_url = cli
            .api_url
            .clone()
            .or_else(|| env_string(ENV_API_URL))
            .or_else(|| file.model.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = env_string(ENV_API_KEY).or_else(|| file.model.api_key.clone());

        let model = cli
            .model
            .clone()
            .or_else(|| env_string(ENV_MODEL))
            .or_else(|| file.model.name.clone())
            .unwrap_or_else(|| GeneratorConfig::DEFAULT_MODEL.to_string());

        let timeout_secs = match cli.timeout_secs {
            Some(secs) => Some(secs),
            None => match env_string(ENV_TIMEOUT_SECS) {
                Some(raw) => Some(
                    raw.parse::<u64>()
                        .with_context(|| format!("{ENV_TIMEOUT_SECS} is not a number of seconds: {raw:?}"))?,
                ),
                None => file.model.timeout_secs,
            },
        };
        let timeout = timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(GeneratorConfig::DEFAULT_TIMEOUT);

        let offline = if cli.offline {
            true
        } else if let Some(raw) = env_string(ENV_OFFLINE) {
            parse_flag(&raw).with_context(|| format!("{ENV_OFFLINE} is not a boolean: {raw:?}"))?
        } else {
            file.model.offline.unwrap_or(false)
        };

        let strategy = cli
            .strategy
            .or(file.generation.strategy)
            .unwrap_or_default();

        Ok(Self {
            api_url,
            api_key,
            model,
            timeout,
            offline,
            strategy,
        })
    }

    /// The orchestrator settings carried by this configuration.
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            model: self.model.clone(),
            call_timeout: self.timeout,
            strategy: self.strategy,
            offline: self.offline,
        }
    }
}

/// Non-empty value of an environment variable.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true or false, got {other:?}"),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
