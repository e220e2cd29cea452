//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{Configuration, DEFAULT_SENDER_KEY};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    destination_count: usize,
    throttled_count: usize,
    delayed_count: usize,
    senders: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(mapper) => {
            let configs = mapper.configs();
            let warnings = collect_warnings(configs);

            let mut senders: Vec<String> = configs
                .iter()
                .map(|c| {
                    if c.sender.is_empty() {
                        DEFAULT_SENDER_KEY.to_string()
                    } else {
                        c.sender.clone()
                    }
                })
                .collect();
            senders.sort();
            senders.dedup();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    destination_count: configs.len(),
                    throttled_count: configs.iter().filter(|c| !c.throttle.is_zero()).count(),
                    delayed_count: configs.iter().filter(|c| !c.delay.is_zero()).count(),
                    senders,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(configs: &[Configuration]) -> Vec<String> {
    let mut warnings = Vec::new();

    if configs.is_empty() {
        warnings.push("No destinations configured - every event will be dropped".to_string());
    }

    for config in configs {
        if !config.include_document
            && (!config.include_document_attrs.is_empty()
                || !config.exclude_document_attrs.is_empty())
        {
            warnings.push(format!(
                "Destination '{}' lists document fields but include_document is off",
                config.name
            ));
        }
        if !config.delay.is_zero() && !config.throttle.is_zero() && !config.throttle_trailing_disabled
        {
            warnings.push(format!(
                "Destination '{}' combines delay with trailing throttle; delayed sends are not awaited",
                config.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Destinations: {}", summary.destination_count);
            println!("  Throttled: {}", summary.throttled_count);
            println!("  Delayed: {}", summary.delayed_count);
            println!("  Senders: {}", summary.senders.join(", "));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
