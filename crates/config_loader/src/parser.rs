//! Configuration parsing
//!
//! JSON (an array of destination objects, the primary format) and TOML
//! (a `[[configs]]` array of tables).

use contracts::{Configuration, ContractError};
use serde::{Deserialize, Serialize};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (recommended)
    Json,
    /// TOML format
    Toml,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// On-disk layout of a destination list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationFile {
    #[serde(default)]
    pub configs: Vec<Configuration>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonLayout {
    List(Vec<Configuration>),
    Wrapped(ConfigurationFile),
}

/// Parse a JSON destination list
pub fn parse_json(content: &str) -> Result<Vec<Configuration>, ContractError> {
    let layout: JsonLayout =
        serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
            message: format!("JSON parse error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(match layout {
        JsonLayout::List(configs) => configs,
        JsonLayout::Wrapped(file) => file.configs,
    })
}

/// Parse a TOML destination list
pub fn parse_toml(content: &str) -> Result<Vec<Configuration>, ContractError> {
    let file: ConfigurationFile = toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })?;
    Ok(file.configs)
}

/// Parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<Vec<Configuration>, ContractError> {
    match format {
        ConfigFormat::Json => parse_json(content),
        ConfigFormat::Toml => parse_toml(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_json_list() {
        let content = r#"[
            {"name": "service_one", "actions": ["product.update"], "callback_url": "http://localhost:3000/one"},
            {"name": "service_two", "actions": ["*"], "callback_url": "http://localhost:3000/two", "throttle": "1s"}
        ]"#;
        let configs = parse_json(content).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].throttle, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_json_wrapped() {
        let content = r#"{"configs": [{"name": "service_one", "actions": ["a"]}]}"#;
        let configs = parse_json(content).unwrap();
        assert_eq!(configs[0].name, "service_one");
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
[[configs]]
name = "service_one"
actions = ["product.update"]
callback_url = "http://localhost:3000/one"
throttle = "500ms"
throttle_trailing_disabled = true

[[configs]]
name = "queue"
actions = ["product.update"]
sender = "beanstalkd"
delay = 2000
"#;
        let configs = parse_toml(content).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].throttle, Duration::from_millis(500));
        assert_eq!(configs[1].delay, Duration::from_secs(2));
        assert_eq!(configs[1].sender, "beanstalkd");
    }

    #[test]
    fn test_parse_json_syntax_error() {
        let err = parse_json("[{").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
