// # DNS Updater Trait
//
// Defines the interface for applying an announced endpoint to a DNS record.
//
// ## Implementations
//
// - Cloudflare (SRV records): `tunnel-dns-cloudflare` crate

use async_trait::async_trait;

use crate::endpoint::Endpoint;

/// Result of a single DNS update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The provider accepted the update
    Applied,
    /// The provider answered with a non-success status
    Rejected {
        /// HTTP status code returned by the provider
        status: u16,
        /// Response body, verbatim
        body: String,
    },
}

impl UpdateOutcome {
    /// Whether the provider accepted the update
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Trait for DNS updater implementations
///
/// An updater is bound to one DNS record at construction time (from the
/// credential record) and rewrites its target and port on request.
///
/// # Boundaries
///
/// - ✅ One API call per invocation
/// - ✅ Report provider rejections as [`UpdateOutcome::Rejected`]
/// - ❌ No retries or backoff
/// - ❌ No deduplication (owned by `ReconciliationLoop`)
///
/// `Err` is reserved for failures where no provider answer was obtained
/// (connection refused, timeout, unreadable response).
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    /// Point the configured record at `endpoint`
    async fn update_endpoint(&self, endpoint: &Endpoint) -> Result<UpdateOutcome, crate::Error>;

    /// Name of the DNS record this updater rewrites (for logging)
    fn record_name(&self) -> &str;

    /// Provider name (e.g., "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS updaters from configuration
pub trait DnsUpdaterFactory: Send + Sync {
    /// Create a DnsUpdater instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsUpdater>, crate::Error>;
}
