//! Built-in filters and middlewares

use std::time::{SystemTime, UNIX_EPOCH};

use contracts::{
    Configuration, ContractError, Destination, Filter, IncomingEvent, Middleware, CONTROL_TIMESTAMP,
};
use serde_json::Value;
use tracing::debug;

/// Control key listing the only destination names allowed to receive an event
pub const DESIRED_HOOKS_KEY: &str = "desired_hooks";

/// Rejects events that cannot be routed to an entity
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateFilter;

impl Filter for ValidateFilter {
    fn name(&self) -> &str {
        "validate"
    }

    fn applicable(&self, _event: &IncomingEvent, _config: &Configuration) -> bool {
        true
    }

    fn run(&self, event: &IncomingEvent, _config: &Configuration) -> Result<bool, ContractError> {
        Ok(event.is_valid())
    }
}

/// Stops events from echoing back to the system that produced them.
///
/// Applies to destinations that declare their own `source`; `allow_loopback`
/// opts back in.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFilter;

impl Filter for SourceFilter {
    fn name(&self) -> &str {
        "source"
    }

    fn applicable(&self, _event: &IncomingEvent, config: &Configuration) -> bool {
        !config.source.is_empty() && !config.allow_loopback
    }

    fn run(&self, event: &IncomingEvent, config: &Configuration) -> Result<bool, ContractError> {
        Ok(event.source != config.source)
    }
}

/// Honours `control.desired_hooks`: when present, only the listed
/// destinations receive the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesiredHookFilter;

impl Filter for DesiredHookFilter {
    fn name(&self) -> &str {
        "desired_hook"
    }

    fn applicable(&self, event: &IncomingEvent, _config: &Configuration) -> bool {
        event
            .control
            .get(DESIRED_HOOKS_KEY)
            .is_some_and(|v| !v.is_null())
    }

    fn run(&self, event: &IncomingEvent, config: &Configuration) -> Result<bool, ContractError> {
        match event.control.get(DESIRED_HOOKS_KEY) {
            Some(Value::Array(hooks)) => Ok(hooks
                .iter()
                .any(|hook| hook.as_str() == Some(config.name.as_str()))),
            Some(Value::String(hook)) => Ok(hook == &config.name),
            _ => Err(ContractError::Other(format!(
                "{DESIRED_HOOKS_KEY} must be a list of destination names"
            ))),
        }
    }
}

/// Stamps `control.ts` with the current time when the event carries none
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlTimestampMiddleware;

impl Middleware for ControlTimestampMiddleware {
    fn name(&self) -> &str {
        "control_timestamp"
    }

    fn apply(&self, event: &mut IncomingEvent, destinations: Vec<Destination>) -> Vec<Destination> {
        if event.control_timestamp().is_none() {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
                .unwrap_or(0);
            debug!(event = %event.trace_info(), ts = now, "Stamping control timestamp");
            event.control.insert(CONTROL_TIMESTAMP.to_string(), now.into());
        }
        destinations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> IncomingEvent {
        IncomingEvent::new("product.update", "core").with_target("Product", "p1")
    }

    fn config(name: &str) -> Configuration {
        Configuration::new(name)
    }

    #[test]
    fn test_validate_filter() {
        assert!(ValidateFilter.run(&event(), &config("a")).unwrap());
        let untargeted = IncomingEvent::new("product.update", "core");
        assert!(!ValidateFilter.run(&untargeted, &config("a")).unwrap());
        let anonymous = IncomingEvent::new("product.update", "").with_target("Product", "p1");
        assert!(!ValidateFilter.run(&anonymous, &config("a")).unwrap());
    }

    #[test]
    fn test_source_filter_blocks_loopback() {
        let mut own = config("core_hook");
        own.source = "core".to_string();
        assert!(SourceFilter.applicable(&event(), &own));
        assert!(!SourceFilter.run(&event(), &own).unwrap());

        own.allow_loopback = true;
        assert!(!SourceFilter.applicable(&event(), &own));

        let mut other = config("search");
        other.source = "search".to_string();
        assert!(SourceFilter.run(&event(), &other).unwrap());
        assert!(!SourceFilter.applicable(&event(), &config("anonymous")));
    }

    #[test]
    fn test_desired_hooks() {
        assert!(!DesiredHookFilter.applicable(&event(), &config("a")));

        let targeted = event().with_control(DESIRED_HOOKS_KEY, json!(["a", "c"]));
        assert!(DesiredHookFilter.applicable(&targeted, &config("a")));
        assert!(DesiredHookFilter.run(&targeted, &config("a")).unwrap());
        assert!(!DesiredHookFilter.run(&targeted, &config("b")).unwrap());

        let malformed = event().with_control(DESIRED_HOOKS_KEY, 7);
        assert!(DesiredHookFilter.run(&malformed, &config("a")).is_err());
    }

    #[test]
    fn test_timestamp_middleware_keeps_existing() {
        let mut stamped = event().with_control("ts", 5u64);
        ControlTimestampMiddleware.apply(&mut stamped, Vec::new());
        assert_eq!(stamped.control_timestamp(), Some(5));

        let mut bare = event();
        let kept = ControlTimestampMiddleware.apply(&mut bare, vec![Destination::new(config("a"))]);
        assert_eq!(kept.len(), 1);
        assert!(bare.control_timestamp().unwrap() > 0);
    }
}
