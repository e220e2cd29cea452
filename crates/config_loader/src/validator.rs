//! Configuration validation
//!
//! Rules:
//! - name non-empty and unique
//! - at least one action
//! - include/exclude lists of one field group are mutually exclusive
//! - delay below one hour
//! - http destinations carry a callback URL

use std::collections::HashSet;
use std::time::Duration;

use contracts::{Configuration, ContractError, Destination, DEFAULT_SENDER_KEY};

const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Validate a destination list
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(configs: &[Configuration]) -> Result<(), ContractError> {
    validate_names(configs)?;
    for (idx, config) in configs.iter().enumerate() {
        validate_actions(idx, config)?;
        validate_attribute_lists(idx, config)?;
        validate_delay(idx, config)?;
        validate_callback(idx, config)?;
    }
    Ok(())
}

fn validate_names(configs: &[Configuration]) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, config) in configs.iter().enumerate() {
        if config.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("configs[{idx}].name"),
                "name cannot be empty",
            ));
        }
        if !seen.insert(config.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("configs[name={}]", config.name),
                "duplicate destination name",
            ));
        }
    }
    Ok(())
}

fn validate_actions(idx: usize, config: &Configuration) -> Result<(), ContractError> {
    if config.actions.is_empty() || config.actions.iter().any(String::is_empty) {
        return Err(ContractError::config_validation(
            format!("configs[{idx}].actions"),
            "at least one non-empty action is required",
        ));
    }
    Ok(())
}

fn validate_attribute_lists(idx: usize, config: &Configuration) -> Result<(), ContractError> {
    if !config.include_document_attrs.is_empty() && !config.exclude_document_attrs.is_empty() {
        return Err(ContractError::config_validation(
            format!("configs[{idx}].include_document_attrs / exclude_document_attrs"),
            "include and exclude lists are mutually exclusive",
        ));
    }
    if !config.include_payload_attrs.is_empty() && !config.exclude_payload_attrs.is_empty() {
        return Err(ContractError::config_validation(
            format!("configs[{idx}].include_payload_attrs / exclude_payload_attrs"),
            "include and exclude lists are mutually exclusive",
        ));
    }
    Ok(())
}

fn validate_delay(idx: usize, config: &Configuration) -> Result<(), ContractError> {
    if config.delay >= MAX_DELAY {
        return Err(ContractError::config_validation(
            format!("configs[{idx}].delay"),
            format!("delay must be < {}s, got {:?}", MAX_DELAY.as_secs(), config.delay),
        ));
    }
    Ok(())
}

fn validate_callback(idx: usize, config: &Configuration) -> Result<(), ContractError> {
    let destination = Destination::new(config.clone());
    if destination.sender_key() == DEFAULT_SENDER_KEY && destination.callback_url().is_empty() {
        return Err(ContractError::config_validation(
            format!("configs[{idx}].callback_url"),
            "http destinations need a callback_url",
        ));
    }
    Ok(())
}
