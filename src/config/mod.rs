//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::activation::Emulator;
use crate::console::{DEFAULT_FAST_PATH_MS, DEFAULT_PORT, DEFAULT_SETTLE_MS, DEFAULT_TIMEOUT_MS};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Serial console connection
    pub console: ConsoleConfig,

    /// Interactive shell behaviour
    pub shell: ShellConfig,

    /// Emulator window activation
    pub activation: ActivationConfig,

    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Host the emulator listens on
    pub host: String,

    /// TCP port bridged to the emulated serial port
    pub port: u16,

    /// Idle timeout for user commands in milliseconds
    pub timeout_ms: u64,

    /// Idle timeout once the prompt is back, in milliseconds
    pub fast_path_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Idle timeout of the liveness probe in milliseconds
    pub probe_timeout_ms: u64,

    /// Idle timeout of the location command in milliseconds
    pub prompt_timeout_ms: u64,

    /// Command whose output becomes the prompt
    pub location_command: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Emulator in use
    pub emulator: Emulator,

    /// Bring the emulator window to the front before each command
    pub activate: bool,

    /// Delay after activation in milliseconds
    pub settle_ms: u64,

    /// Directory holding the activation scripts
    pub script_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Logging level
    pub level: String,

    /// Optional file to mirror logs into
    pub file_path: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            fast_path_ms: DEFAULT_FAST_PATH_MS,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 100,
            prompt_timeout_ms: 250,
            location_command: "cd".to_string(),
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            emulator: Emulator::default(),
            activate: false,
            settle_ms: DEFAULT_SETTLE_MS,
            script_dir: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration; a missing file means defaults plus environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load_from_file(path);
        }

        tracing::debug!(
            "No config file at {}, using defaults",
            path.as_ref().display()
        );
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides, for when no file can be used
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // AMISHELL_HOST - console host
        if let Some(host) = lookup("AMISHELL_HOST") {
            if !host.trim().is_empty() {
                self.console.host = host.trim().to_string();
            }
        }

        // AMISHELL_PORT - console port
        if let Some(port) = lookup("AMISHELL_PORT") {
            if let Ok(value) = port.parse::<u16>() {
                self.console.port = value;
            }
        }

        // AMISHELL_TIMEOUT_MS - idle timeout for user commands
        if let Some(timeout) = lookup("AMISHELL_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.console.timeout_ms = value;
            }
        }

        // AMISHELL_EMULATOR - fsuae or winuae
        if let Some(emulator) = lookup("AMISHELL_EMULATOR") {
            if let Some(value) = Emulator::parse(&emulator) {
                self.activation.emulator = value;
            }
        }

        // AMISHELL_ACTIVATE - raise the emulator window before each command
        if let Some(activate) = lookup("AMISHELL_ACTIVATE") {
            match parse_flag(&activate) {
                Some(value) => self.activation.activate = value,
                None => tracing::warn!("Ignoring AMISHELL_ACTIVATE={:?}", activate),
            }
        }

        // AMISHELL_SCRIPT_DIR - activation script directory
        if let Some(dir) = lookup("AMISHELL_SCRIPT_DIR") {
            if !dir.trim().is_empty() {
                self.activation.script_dir = Some(PathBuf::from(dir));
            }
        }

        // AMISHELL_LOG_LEVEL - logging level
        if let Some(level) = lookup("AMISHELL_LOG_LEVEL") {
            self.log.level = level;
        }

        // AMISHELL_LOG_FILE_PATH - logging destination file
        if let Some(file_path) = lookup("AMISHELL_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = Some(file_path);
            }
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.console.host.trim().is_empty() {
            anyhow::bail!("console.host must not be empty");
        }

        if self.console.port == 0 {
            anyhow::bail!("console.port must be greater than 0");
        }

        if self.console.timeout_ms == 0 {
            anyhow::bail!("console.timeout_ms must be greater than 0");
        }

        if self.console.fast_path_ms == 0 {
            anyhow::bail!("console.fast_path_ms must be greater than 0");
        }

        if self.shell.probe_timeout_ms == 0 || self.shell.prompt_timeout_ms == 0 {
            anyhow::bail!("shell timeouts must be greater than 0");
        }

        if self.shell.location_command.contains('\r') {
            anyhow::bail!("shell.location_command must not contain a carriage return");
        }

        if let Some(file_path) = &self.log.file_path {
            if file_path.trim().is_empty() {
                anyhow::bail!("Log file path must not be empty");
            }
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
