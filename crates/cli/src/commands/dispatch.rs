//! `dispatch` command implementation.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{Document, EventSender, IncomingEvent};
use dispatcher::{
    BeanstalkdSender, BeanstalkdSenderConfig, Captin, DispatchSummary, LogSender,
    StaticDocumentStore,
};
use observability::DeliveryAggregator;
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::DispatchArgs;
use crate::error::CliError;

/// One event or a batch
#[derive(Deserialize)]
#[serde(untagged)]
enum EventInput {
    Many(Vec<IncomingEvent>),
    One(Box<IncomingEvent>),
}

#[derive(Deserialize)]
struct DocumentEntry {
    target_type: String,
    target_id: String,
    document: Document,
}

/// Execute the `dispatch` command
pub async fn run_dispatch(args: &DispatchArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading destinations");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }
    let mapper = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let events = read_events(&args.event)?;
    info!(
        destinations = mapper.configs().len(),
        events = events.len(),
        "Configuration loaded"
    );

    let mut captin = Captin::new(mapper).context("Failed to build dispatcher")?;
    captin.set_sender_mapping(builtin_senders());
    if let Some(path) = &args.documents {
        captin = captin.with_document_store("default", Arc::new(read_documents(path)?));
    }

    let mut aggregator = DeliveryAggregator::new();
    for event in events {
        let trace = event.trace_info();
        match captin.execute(event).await {
            Ok(summary) => record_summary(&mut aggregator, &summary),
            Err(e) => warn!(event = %trace, error = %e, "Event rejected"),
        }
    }

    if args.wait {
        info!(pending = captin.pending(), "Waiting for detached sends");
        captin.settle().await;
    } else if captin.pending() > 0 {
        warn!(
            pending = captin.pending(),
            "Exiting with armed timers, pass --wait to deliver them"
        );
    }

    print!("{aggregator}");

    let errors = captin.take_errors();
    for error in &errors {
        println!("✗ {error}");
    }

    if !errors.is_empty() {
        return Err(CliError::DeliveryFailures {
            count: errors.len(),
        }
        .into());
    }
    Ok(())
}

fn record_summary(aggregator: &mut DeliveryAggregator, summary: &DispatchSummary) {
    for report in summary.reports() {
        aggregator.record(&report.destination, report.outcome);
        if let Some(latency) = report.latency {
            aggregator.record_latency_ms(latency.as_secs_f64() * 1000.0);
        }
    }
}

fn builtin_senders() -> HashMap<String, Arc<dyn EventSender>> {
    let mut senders: HashMap<String, Arc<dyn EventSender>> = HashMap::new();
    senders.insert("log".to_string(), Arc::new(LogSender::new("log")));
    senders.insert(
        "beanstalkd".to_string(),
        Arc::new(BeanstalkdSender::new(
            "beanstalkd",
            BeanstalkdSenderConfig::default(),
        )),
    );
    senders
}

fn read_events(path: &Path) -> Result<Vec<IncomingEvent>, CliError> {
    let source_name = path.display().to_string();
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    parse_events(&content).map_err(|e| CliError::event_input(source_name, e.to_string()))
}

fn parse_events(content: &str) -> Result<Vec<IncomingEvent>, serde_json::Error> {
    Ok(match serde_json::from_str::<EventInput>(content)? {
        EventInput::Many(events) => events,
        EventInput::One(event) => vec![*event],
    })
}

fn read_documents(path: &Path) -> Result<StaticDocumentStore> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents from {}", path.display()))?;
    let entries: Vec<DocumentEntry> =
        serde_json::from_str(&content).context("Failed to parse documents")?;

    let mut store = StaticDocumentStore::new();
    for entry in entries {
        store.insert(entry.target_type, entry.target_id, entry.document);
    }
    Ok(store)
}
