//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the workspace.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Contents
//! - `IncomingEvent`: the event received from ingress
//! - `Configuration` / `Destination`: per-destination delivery policy
//! - Collaborator traits: `EventSender`, `Store`, `Throttle`, `DocumentStore`,
//!   `Filter`, `Middleware`

mod config;
mod document;
mod duration;
mod error;
mod event;
mod filter;
mod sender;
mod store;

pub use config::*;
pub use document::*;
pub use duration::parse_duration;
pub use error::*;
pub use event::*;
pub use filter::*;
pub use sender::*;
pub use store::*;
