//! Filter / Middleware traits - the veto chain run before transport

use crate::{Configuration, ContractError, Destination, IncomingEvent};

/// Veto gate for one destination
pub trait Filter: Send + Sync {
    /// Filter name (used for logging)
    fn name(&self) -> &str;

    /// Whether `run` should be consulted for this destination
    fn applicable(&self, event: &IncomingEvent, config: &Configuration) -> bool;

    /// `Ok(false)` or an error vetoes delivery
    fn run(&self, event: &IncomingEvent, config: &Configuration) -> Result<bool, ContractError>;
}

/// Observe or transform hook run after the filters
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// May rewrite the event and narrow the destination list
    fn apply(&self, event: &mut IncomingEvent, destinations: Vec<Destination>) -> Vec<Destination>;
}
