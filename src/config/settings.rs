use crate::utils::error::{EsgError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "lupa-esg.toml";
pub const DEFAULT_CVM_BASE_URL: &str = "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/FRE/DADOS/";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project: ProjectSettings,
    pub logging: LoggingSettings,
    pub source: SourceSettings,
    pub storage: StorageSettings,
    pub processing: ProcessingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub name: String,
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_url: String,
    pub temp_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub batch_size: usize,
    pub max_retries: u32,
    pub cleanup_after_days: u64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: "lupa_esg".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CVM_BASE_URL.to_string(),
            timeout_seconds: 300,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/lupa_esg.db".to_string(),
            temp_dir: "data/temp".to_string(),
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_retries: 3,
            cleanup_after_days: 7,
        }
    }
}

impl Settings {
    /// Loads `path` when given, else `lupa-esg.toml` if present, else defaults;
    /// environment variables are applied on top in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| EsgError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EsgError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Same variable names as `.env.example`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("PROJECT_NAME") {
            self.project.name = v;
        }
        if let Some(v) = non_empty("ENV") {
            self.project.environment = v;
        }
        if let Some(v) = non_empty("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = non_empty("DATABASE_URL") {
            self.storage.database_url = v;
        }
        if let Some(v) = non_empty("LUPA_TEMP_DIR") {
            self.storage.temp_dir = v;
        }
        if let Some(v) = non_empty("CVM_BASE_URL") {
            self.source.base_url = v;
        }
    }

    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.temp_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds)
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::parse(&self.logging.format).unwrap_or(LogFormat::Compact)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("project.name", &self.project.name)?;
        validation::validate_one_of("logging.level", &self.logging.level, &LOG_LEVELS)?;
        validation::validate_one_of("logging.format", &self.logging.format, &["compact", "text", "json"])?;
        validation::validate_portal_url("source.base_url", &self.source.base_url)?;
        validation::validate_at_least("source.timeout_seconds", self.source.timeout_seconds, 1)?;
        validation::validate_database_url("storage.database_url", &self.storage.database_url)?;
        validation::validate_temp_dir("storage.temp_dir", &self.storage.temp_dir)?;
        validation::validate_at_least("processing.batch_size", self.processing.batch_size as u64, 1)?;
        validation::validate_at_least("processing.max_retries", self.processing.max_retries as u64, 1)?;
        Ok(())
    }
}

/// Replaces `${VAR}` with the variable's value; unknown variables are left as-is.
fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EsgError::ConfigError {
        message: format!("invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}
