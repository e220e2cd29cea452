//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{Configuration, Destination};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Destination info for JSON output
#[derive(Serialize)]
struct DestinationInfo {
    name: String,
    actions: Vec<String>,
    sender: String,
    callback_url: String,
    throttle_ms: u64,
    trailing: bool,
    delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_store: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    payload_fields: Vec<String>,
}

impl From<&Configuration> for DestinationInfo {
    fn from(config: &Configuration) -> Self {
        let destination = Destination::new(config.clone());
        let payload_fields = if !config.include_payload_attrs.is_empty() {
            config.include_payload_attrs.clone()
        } else {
            config
                .exclude_payload_attrs
                .iter()
                .map(|f| format!("-{f}"))
                .collect()
        };

        Self {
            name: config.name.clone(),
            actions: config.actions.clone(),
            sender: destination.sender_key().to_string(),
            callback_url: destination.callback_url(),
            throttle_ms: config.throttle.as_millis() as u64,
            trailing: !config.throttle.is_zero() && !config.throttle_trailing_disabled,
            delay_ms: config.delay.as_millis() as u64,
            document_store: config
                .include_document
                .then(|| destination.document_store_key().to_string()),
            payload_fields,
        }
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mapper = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let infos: Vec<DestinationInfo> = mapper.configs().iter().map(DestinationInfo::from).collect();

    if args.json {
        let json =
            serde_json::to_string_pretty(&infos).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_destinations(&infos);
    }

    Ok(())
}

fn print_destinations(infos: &[DestinationInfo]) {
    println!("📤 Destinations ({})", infos.len());
    for (i, d) in infos.iter().enumerate() {
        let is_last = i == infos.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };

        println!("   {} {} [{}] {}", prefix, d.name, d.sender, d.callback_url);
        println!("   {}  ├─ Actions: {}", child, d.actions.join(", "));
        if d.throttle_ms > 0 {
            let mode = if d.trailing { "trailing" } else { "drop" };
            println!("   {}  ├─ Throttle: {} ms ({})", child, d.throttle_ms, mode);
        }
        if d.delay_ms > 0 {
            println!("   {}  ├─ Delay: {} ms", child, d.delay_ms);
        }
        if let Some(ref store) = d.document_store {
            println!("   {}  ├─ Document store: {}", child, store);
        }
        if !d.payload_fields.is_empty() {
            println!("   {}  ├─ Payload fields: {}", child, d.payload_fields.join(", "));
        }
        println!("   {}  └─", child);
    }
    println!();
}
