use crate::console::{PromptLanguage, Prompts};
use crate::session::{FlowConfig, SaveMode};
use qt_protocol::TransportConfig;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const READ_TIMEOUT_VAR: &str = "QT_READ_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_VAR: &str = "QT_CONNECT_TIMEOUT_SECS";
pub const SAVE_MODE_VAR: &str = "QT_SAVE_MODE";
pub const LANGUAGE_VAR: &str = "QT_LANGUAGE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: String, value: String },
    #[error("Could not read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Client settings resolved from defaults, environment and command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `None` blocks on the server indefinitely
    pub read_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub save_mode: SaveMode,
    pub language: PromptLanguage,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            read_timeout: None,
            connect_timeout: Some(Duration::from_secs(10)),
            save_mode: SaveMode::default(),
            language: PromptLanguage::default(),
        }
    }
}

/// Command line values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub read_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub save_mode: Option<SaveMode>,
    pub language: Option<PromptLanguage>,
}

impl Settings {
    /// Load settings from the process environment, reading `.env` if present
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load an explicit env file into the process environment, then read it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::from_path(path)?;
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, READ_TIMEOUT_VAR)? {
            settings.read_timeout = timeout_from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, CONNECT_TIMEOUT_VAR)? {
            settings.connect_timeout = timeout_from_secs(secs);
        }
        if let Some(mode) = parse_var::<SaveMode, _>(&lookup, SAVE_MODE_VAR)? {
            settings.save_mode = mode;
        }
        if let Some(language) = parse_var::<PromptLanguage, _>(&lookup, LANGUAGE_VAR)? {
            settings.language = language;
        }

        Ok(settings)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(secs) = overrides.read_timeout_secs {
            self.read_timeout = timeout_from_secs(secs);
        }
        if let Some(secs) = overrides.connect_timeout_secs {
            self.connect_timeout = timeout_from_secs(secs);
        }
        if let Some(mode) = overrides.save_mode {
            self.save_mode = mode;
        }
        if let Some(language) = overrides.language {
            self.language = language;
        }
        self
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.read_timeout,
        }
    }

    pub fn flow(&self) -> FlowConfig {
        FlowConfig {
            save_mode: self.save_mode,
            prompts: Prompts::for_language(self.language),
        }
    }
}

/// Zero seconds disables the timeout
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
    }
}
