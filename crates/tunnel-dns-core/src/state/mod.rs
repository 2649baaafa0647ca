// # Reconciliation State
//
// Tracks which exposed hosts have already been synchronized.
//
// The state lives in memory for one run of the reconciliation loop and is
// never persisted: after a restart of the daemon every announced host is
// treated as new again.

pub mod seen_hosts;

pub use seen_hosts::SeenHosts;
