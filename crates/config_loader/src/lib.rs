//! # Config Loader
//!
//! Destination configuration loading.
//!
//! Responsibilities:
//! - Parse JSON/TOML destination lists
//! - Validate configuration legality
//! - Build a `ConfigurationMapper`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let mapper = ConfigLoader::load_from_path(Path::new("hooks.json")).unwrap();
//! println!("destinations: {}", mapper.configs().len());
//! ```

mod mapper;
mod parser;
mod validator;

pub use mapper::ConfigurationMapper;
pub use parser::{ConfigFormat, ConfigurationFile};

use contracts::{Configuration, ContractError};
use std::path::Path;
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load destinations from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load destinations from file path
    ///
    /// Automatically detects format from file extension (.json / .toml).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ConfigurationMapper, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let mapper = Self::load_from_str(&content, format)?;
        debug!(
            path = %path.display(),
            destinations = mapper.configs().len(),
            "Destination configuration loaded"
        );
        Ok(mapper)
    }

    /// Load destinations from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ConfigurationMapper, ContractError> {
        let configs = Self::parse_and_validate(content, format)?;
        Ok(ConfigurationMapper::new(configs))
    }

    /// Serialize destinations to JSON string
    pub fn to_json(configs: &[Configuration]) -> Result<String, ContractError> {
        serde_json::to_string_pretty(configs)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<Vec<Configuration>, ContractError> {
        let configs = parser::parse(content, format)?;
        validator::validate(&configs)?;
        Ok(configs)
    }
}
