// # tunnel-dns-core
//
// Core library for keeping a DNS record in sync with the public endpoints
// announced by a tunneling agent.
//
// ## Architecture Overview
//
// - **LineSource**: Trait for supervising the tunnel process and streaming its output
// - **extract_endpoint**: Pure parser turning one output line into an `Endpoint`
// - **SeenHosts**: Reconciliation state enforcing at-most-once updates per host
// - **DnsUpdater**: Trait for pushing an endpoint to a DNS record via a provider API
// - **ReconciliationLoop**: Orchestrates the line → endpoint → DNS update flow
// - **Registry**: Plugin-based registry for line sources and DNS updaters
//
// ## Data Flow
//
// ```text
// LineSource ──line──▶ extract_endpoint ──Endpoint──▶ SeenHosts ──new host──▶ DnsUpdater
// ```

pub mod traits;
pub mod endpoint;
pub mod engine;
pub mod registry;
pub mod config;
pub mod credentials;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{DnsUpdater, LineSource, LineStream, UpdateOutcome};
pub use endpoint::{Endpoint, extract_endpoint};
pub use engine::{LineOutcome, LoopEvent, ReconciliationLoop};
pub use registry::Registry;
pub use config::{EngineConfig, ExitPolicy, ProviderConfig, TunnelConfig, TunnelDnsConfig};
pub use credentials::{Credentials, DnsRecordDescriptor};
pub use error::{Error, Result};
pub use state::SeenHosts;
