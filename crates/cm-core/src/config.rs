//! Configuration types and loading
//!
//! Values are read once at startup and treated as immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory created under the platform temp dir when no base directory is configured
pub const DEFAULT_WORK_AREA_DIRECTORY: &str = "commerce-work-areas";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// File work area and storage configuration
    pub files: FileServiceConfig,

    /// Email composition configuration
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileServiceConfig {
    /// Base directory for temporary work areas (platform temp dir when unset)
    pub temp_base_directory: Option<PathBuf>,
    /// Number of random directory levels appended to each work area
    pub max_generated_directory_depth: usize,
    /// Directory holding bundled static resources (disabled when unset)
    pub static_resource_directory: Option<PathBuf>,
    /// Root of the local filesystem storage provider
    pub storage_path: PathBuf,
}

impl Default for FileServiceConfig {
    fn default() -> Self {
        Self {
            temp_base_directory: None,
            max_generated_directory_depth: 0,
            static_resource_directory: None,
            storage_path: std::env::temp_dir().join("commerce-assets"),
        }
    }
}

impl FileServiceConfig {
    /// Resolved base directory for work areas
    pub fn work_area_base(&self) -> PathBuf {
        match &self.temp_base_directory {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join(DEFAULT_WORK_AREA_DIRECTORY),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub delivery_method: EmailDeliveryMethod,
    pub from_address: String,
    pub from_name: Option<String>,
    /// Character encoding declared on composed messages
    pub encoding: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            delivery_method: EmailDeliveryMethod::Log,
            from_address: "store@example.com".to_string(),
            from_name: None,
            encoding: "UTF-8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailDeliveryMethod {
    /// Write messages to the log
    #[default]
    Log,
    /// Keep messages in memory
    Memory,
}

impl std::str::FromStr for EmailDeliveryMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "memory" | "test" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "EMAIL_DELIVERY_METHOD".to_string(),
                message: format!("unknown delivery method '{}'", other),
            }),
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Files
        if let Some(dir) = non_empty("FILE_SERVICE_TEMP_BASE_DIRECTORY") {
            config.files.temp_base_directory = Some(PathBuf::from(dir));
        }
        if let Some(depth) = non_empty("FILE_SERVICE_MAX_GENERATED_DIRECTORY_DEPTH") {
            config.files.max_generated_directory_depth =
                depth.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "FILE_SERVICE_MAX_GENERATED_DIRECTORY_DEPTH".to_string(),
                    message: format!("expected a non-negative integer, got '{}'", depth),
                })?;
        }
        if let Some(dir) = non_empty("FILE_SERVICE_STATIC_DIRECTORY") {
            config.files.static_resource_directory = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty("FILE_SERVICE_STORAGE_PATH") {
            config.files.storage_path = PathBuf::from(dir);
        }

        // Email
        if let Some(method) = non_empty("EMAIL_DELIVERY_METHOD") {
            config.email.delivery_method = method.parse()?;
        }
        if let Some(from) = non_empty("EMAIL_FROM_ADDRESS") {
            config.email.from_address = from;
        }
        if let Some(name) = non_empty("EMAIL_FROM_NAME") {
            config.email.from_name = Some(name);
        }
        if let Some(encoding) = non_empty("EMAIL_ENCODING") {
            config.email.encoding = encoding;
        }

        Ok(config)
    }
}
