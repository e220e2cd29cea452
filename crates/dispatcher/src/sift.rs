//! Sift - the filter/middleware pass that may veto destinations

use std::sync::Arc;

use contracts::{Destination, Filter, IncomingEvent, Middleware};
use tracing::{debug, warn};

/// Destinations still eligible for `event` after every filter and middleware.
///
/// A destination is dropped when any applicable filter returns `false` or
/// an error. Middlewares run afterwards, in order, and may rewrite the
/// event and narrow the list.
pub fn sift(
    event: &mut IncomingEvent,
    destinations: Vec<Destination>,
    filters: &[Arc<dyn Filter>],
    middlewares: &[Arc<dyn Middleware>],
) -> Vec<Destination> {
    let mut eligible: Vec<Destination> = destinations
        .into_iter()
        .filter(|destination| passes_filters(event, destination, filters))
        .collect();

    for middleware in middlewares {
        eligible = middleware.apply(event, eligible);
    }

    eligible
}

fn passes_filters(event: &IncomingEvent, destination: &Destination, filters: &[Arc<dyn Filter>]) -> bool {
    for filter in filters {
        if !filter.applicable(event, &destination.config) {
            continue;
        }
        match filter.run(event, &destination.config) {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    filter = filter.name(),
                    destination = %destination.name(),
                    event = %event.trace_info(),
                    "Destination vetoed by filter"
                );
                return false;
            }
            Err(e) => {
                warn!(
                    filter = filter.name(),
                    destination = %destination.name(),
                    error = %e,
                    "Filter failed, destination vetoed"
                );
                return false;
            }
        }
    }
    true
}
