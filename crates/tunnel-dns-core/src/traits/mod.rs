//! Core traits for the tunnel DNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`LineSource`]: Supervise the tunnel process and stream its output lines
//! - [`DnsUpdater`]: Push an announced endpoint to a DNS record

pub mod line_source;
pub mod dns_updater;

pub use line_source::{LineSource, LineSourceFactory, LineStream};
pub use dns_updater::{DnsUpdater, DnsUpdaterFactory, UpdateOutcome};
