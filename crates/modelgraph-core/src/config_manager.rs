use crate::ModelGraphError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for ModelGraphError {
    fn from(err: ConfigError) -> Self {
        ModelGraphError::Config(err.to_string())
    }
}

/// Main configuration for ModelGraph
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelGraphConfig {
    /// Which files under a scan root are candidate modules
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Router file detection
    #[serde(default)]
    pub router: RouterConfig,

    /// Dispatch call-site recognition
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// File extensions (without dot) parsed as modules
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns excluded from the scan
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// When non-empty, only paths matching one of these globs are scanned
    #[serde(default)]
    pub include_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_patterns: default_exclude_patterns(),
            include_patterns: Vec::new(),
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    /// File names treated as the router definition
    #[serde(default = "default_router_file_names")]
    pub file_names: Vec<String>,

    /// JSX tags that describe routes
    #[serde(default = "default_route_tags")]
    pub route_tags: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            file_names: default_router_file_names(),
            route_tags: default_route_tags(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Callee expressions whose first argument `{ type: '...' }` names an action
    #[serde(default = "default_dispatch_callees")]
    pub callees: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            callees: default_dispatch_callees(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_extensions() -> Vec<String> {
    ["js", "jsx", "mjs", "cjs"].iter().map(|s| s.to_string()).collect()
}
fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/coverage/**".to_string(),
        "**/.umi/**".to_string(),
    ]
}
fn default_router_file_names() -> Vec<String> {
    vec!["router.js".to_string(), "router.jsx".to_string()]
}
fn default_route_tags() -> Vec<String> {
    ["Router", "Route", "IndexRoute", "Redirect", "IndexRedirect", "Switch"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_dispatch_callees() -> Vec<String> {
    vec![
        "put".to_string(),
        "put.resolve".to_string(),
        "dispatch".to_string(),
    ]
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with smart defaults
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ModelGraphConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (`MODELGRAPH_*`, `RUST_LOG`)
    /// 2. Config file (`.modelgraph.toml`, then `~/.modelgraph/config.toml`)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let (config, config_path) = Self::load_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load one explicit file; it must exist.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    pub fn from_config(config: ModelGraphConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn finish(config: ModelGraphConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => debug!("No config file found, using defaults"),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn load_config_file() -> Result<(ModelGraphConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".modelgraph.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".modelgraph").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((ModelGraphConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<ModelGraphConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: ModelGraphConfig) -> ModelGraphConfig {
        if let Ok(extensions) = std::env::var("MODELGRAPH_EXTENSIONS") {
            config.discovery.extensions = split_list(&extensions);
        }
        if let Ok(excludes) = std::env::var("MODELGRAPH_EXCLUDE") {
            config.discovery.exclude_patterns = split_list(&excludes);
        }
        if let Ok(names) = std::env::var("MODELGRAPH_ROUTER_FILES") {
            config.router.file_names = split_list(&names);
        }
        if let Ok(callees) = std::env::var("MODELGRAPH_DISPATCH_CALLEES") {
            config.dispatch.callees = split_list(&callees);
        }
        if let Ok(format) = std::env::var("MODELGRAPH_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Ok(level) = std::env::var("MODELGRAPH_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }

    pub fn validate_config(config: &ModelGraphConfig) -> Result<(), ConfigError> {
        if config.discovery.extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "discovery.extensions must not be empty".to_string(),
            ));
        }
        if let Some(ext) = config.discovery.extensions.iter().find(|e| e.starts_with('.')) {
            return Err(ConfigError::ValidationError(format!(
                "Extension '{}' must be given without a leading dot",
                ext
            )));
        }
        if config.dispatch.callees.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "dispatch.callees must not contain empty names".to_string(),
            ));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &ModelGraphConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = ModelGraphConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
