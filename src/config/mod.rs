//! Configuration management
//!
//! This module handles loading and parsing configuration for the Waldo backend
//! and the admin-side list client.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Admin client configuration
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the dashboard front end)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1337
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/waldo.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Path prefix the resource routes are mounted under
    #[serde(default = "default_api_prefix")]
    pub prefix: String,
    /// Page size used when a request carries none (or an invalid one)
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Upper bound for any requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Bearer token required for write requests (disabled when unset)
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: default_api_prefix(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            token: None,
        }
    }
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_page_size() -> u32 {
    25
}

fn default_max_page_size() -> u32 {
    100
}

/// Admin client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the backend (without the API prefix)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory holding persisted list preferences
    #[serde(default = "default_preferences_dir")]
    pub preferences_dir: PathBuf,
    /// Storage namespace for list preferences
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            preferences_dir: default_preferences_dir(),
            namespace: default_namespace(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:1337".to_string()
}

fn default_preferences_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_namespace() -> String {
    "preferences-storage".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - WALDO_SERVER_HOST / WALDO_SERVER_PORT / WALDO_SERVER_CORS_ORIGIN
    /// - WALDO_DATABASE_DRIVER / WALDO_DATABASE_URL
    /// - WALDO_CACHE_TTL_SECONDS
    /// - WALDO_API_DEFAULT_PAGE_SIZE / WALDO_API_MAX_PAGE_SIZE / WALDO_API_TOKEN
    /// - WALDO_CLIENT_BASE_URL / WALDO_CLIENT_PREFERENCES_DIR
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the list controller cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.default_page_size == 0 {
            return Err(ConfigError::ValidationError(
                "api.default_page_size must be greater than zero".to_string(),
            ));
        }
        if self.api.max_page_size < self.api.default_page_size {
            return Err(ConfigError::ValidationError(format!(
                "api.max_page_size ({}) is smaller than api.default_page_size ({})",
                self.api.max_page_size, self.api.default_page_size
            )));
        }
        if !self.api.prefix.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "api.prefix must start with '/': {}",
                self.api.prefix
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("WALDO_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("WALDO_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("WALDO_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("WALDO_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("WALDO_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("WALDO_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(size) = std::env::var("WALDO_API_DEFAULT_PAGE_SIZE") {
            if let Ok(size) = size.parse::<u32>() {
                self.api.default_page_size = size;
            }
        }
        if let Ok(size) = std::env::var("WALDO_API_MAX_PAGE_SIZE") {
            if let Ok(size) = size.parse::<u32>() {
                self.api.max_page_size = size;
            }
        }
        if let Ok(token) = std::env::var("WALDO_API_TOKEN") {
            self.api.token = if token.is_empty() { None } else { Some(token) };
        }

        if let Ok(base_url) = std::env::var("WALDO_CLIENT_BASE_URL") {
            self.client.base_url = base_url;
        }
        if let Ok(dir) = std::env::var("WALDO_CLIENT_PREFERENCES_DIR") {
            self.client.preferences_dir = PathBuf::from(dir);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
