//! Configuration file loading and parsing.

use crate::types::{WardenConfig, WindowSettings};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Relative location of the config file inside a project directory.
pub const CONFIG_FILE: &str = ".warden/config.yaml";

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_VAR: &str = "WARDEN_CONFIG_PATH";

/// Longest accepted rate limit window: one year.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
});

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from `.warden/config.yaml`, or defaults when absent.
    ///
    /// `WARDEN_CONFIG_PATH` takes precedence over the project directory.
    pub fn load(&self) -> Result<WardenConfig, ConfigError> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_VAR) {
            return self.load_from_path(explicit);
        }

        let config_path = self.base_path.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(WardenConfig::default());
        }
        self.load_from_path(config_path)
    }

    /// Load configuration from an explicit file. The file must exist.
    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<WardenConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        self.parse(&contents)
    }

    /// Parse YAML text into a validated configuration.
    pub fn parse(&self, contents: &str) -> Result<WardenConfig, ConfigError> {
        let expanded = self.expand_env_vars(contents)?;

        let config: WardenConfig = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        self.validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();

        for cap in ENV_VAR_PATTERN.captures_iter(content) {
            let full_match = &cap[0];
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    /// Validate configuration values.
    fn validate(&self, config: &WardenConfig) -> Result<(), ConfigError> {
        validate_window("rate_limit.standard", &config.rate_limit.standard)?;
        validate_window("rate_limit.admin", &config.rate_limit.admin)?;
        for (operation, window) in &config.rate_limit.operations {
            validate_window(&format!("rate_limit.operations.{}", operation), window)?;
        }

        if config.audit.buffer_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "audit.buffer_size must be greater than 0".to_string(),
            });
        }

        if config.audit.batch_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "audit.batch_size must be greater than 0".to_string(),
            });
        }

        if config.session.ttl_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "session.ttl_secs must be greater than 0".to_string(),
            });
        }
        if config.session.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::ValidationError {
                message: format!("session.ttl_secs must be at most {}", MAX_SESSION_TTL_SECS),
            });
        }

        Ok(())
    }

    /// Save configuration to `.warden/config.yaml`.
    pub fn save(&self, config: &WardenConfig) -> Result<(), ConfigError> {
        let config_path = self.base_path.join(CONFIG_FILE);
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let yaml = serde_yaml::to_string(config)
            .map_err(|e| ConfigError::ParseError {
                line: None,
                message: e.to_string(),
            })?;

        std::fs::write(config_path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

fn validate_window(name: &str, window: &WindowSettings) -> Result<(), ConfigError> {
    if window.max_requests == 0 {
        return Err(ConfigError::ValidationError {
            message: format!("{}.max_requests must be greater than 0", name),
        });
    }
    if window.window_secs == 0 {
        return Err(ConfigError::ValidationError {
            message: format!("{}.window_secs must be greater than 0", name),
        });
    }
    if window.window_secs > MAX_WINDOW_SECS {
        return Err(ConfigError::ValidationError {
            message: format!("{}.window_secs must be at most {}", name, MAX_WINDOW_SECS),
        });
    }
    Ok(())
}
