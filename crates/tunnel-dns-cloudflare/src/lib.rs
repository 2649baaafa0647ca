// # Cloudflare SRV Updater
//
// This crate provides the Cloudflare DNS updater for the tunnel DNS system.
//
// ## Behaviour
//
// - ✅ One PATCH request per announced endpoint
// - ✅ Only HTTP 200 counts as success; any other status is returned verbatim
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (a failed endpoint is reported, not retried)
// - ❌ NO record lookup (the record ID comes from the credential record)
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Updater construction fails fast if the credential record is incomplete
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tunnel_dns_core::config::ProviderConfig;
use tunnel_dns_core::traits::{DnsUpdater, DnsUpdaterFactory, UpdateOutcome};
use tunnel_dns_core::{Credentials, DnsRecordDescriptor, Endpoint, Error, Registry, Result};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare SRV record updater
///
/// Bound to one record at construction; every call rewrites that record's
/// `data.target` and `data.port`.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the updater logs the intended PATCH request and
/// reports success without contacting Cloudflare.
pub struct CloudflareUpdater {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone containing the record
    zone_id: String,

    /// Record to rewrite
    record: DnsRecordDescriptor,

    /// API base URL (overridable for tests)
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, log the PATCH instead of sending it
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareUpdater")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("record", &self.record.name)
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareUpdater {
    /// Create a new Cloudflare updater
    ///
    /// # Parameters
    ///
    /// - `credentials`: Token with Zone:DNS:Edit permission, zone and SRV record
    /// - `dry_run`: If true, log updates instead of sending them
    pub fn new(credentials: &Credentials, dry_run: bool) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token: credentials.api_token.clone(),
            zone_id: credentials.zone_id.clone(),
            record: credentials.dns_record.clone(),
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a new Cloudflare updater (production/live mode)
    pub fn new_live(credentials: &Credentials) -> Result<Self> {
        Self::new(credentials, false)
    }

    /// Create a new Cloudflare updater (dry-run mode)
    pub fn new_dry_run(credentials: &Credentials) -> Result<Self> {
        Self::new(credentials, true)
    }

    /// Use a different API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Use a preconfigured HTTP client
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// URL of the record update endpoint
    fn record_url(&self) -> String {
        format!(
            "{}/zones/{}/dns_records/{}",
            self.api_base.trim_end_matches('/'),
            self.zone_id,
            self.record.id
        )
    }
}

/// Build the PATCH body for an endpoint
///
/// ```json
/// {"data": {"port": 25565, "target": "myserver.example.com"}}
/// ```
///
/// The port is sent as a number when it is one, verbatim otherwise.
fn build_payload(endpoint: &Endpoint) -> Value {
    let port = endpoint
        .port_number()
        .map(Value::from)
        .unwrap_or_else(|| Value::String(endpoint.local_port.clone()));

    serde_json::json!({
        "data": {
            "port": port,
            "target": endpoint.exposed_host,
        }
    })
}

/// Operator hint for common Cloudflare failure statuses
fn status_hint(status: u16) -> Option<&'static str> {
    match status {
        401 | 403 => Some("Authentication failed: invalid API token or insufficient permissions"),
        404 => Some("Zone or DNS record not found: check zone_id and dns_record.id"),
        429 => Some("Rate limit exceeded"),
        500..=599 => Some("Cloudflare server error (transient)"),
        _ => None,
    }
}

#[async_trait]
impl DnsUpdater for CloudflareUpdater {
    /// Rewrite the SRV record's target and port
    ///
    /// # API Call
    ///
    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// Authorization: Bearer <token>
    ///
    /// {"data": {"port": <port>, "target": <host>}}
    /// ```
    async fn update_endpoint(&self, endpoint: &Endpoint) -> Result<UpdateOutcome> {
        let url = self.record_url();
        let payload = build_payload(endpoint);

        tracing::debug!(
            "Patching Cloudflare record {} -> {} [mode: {}]",
            self.record.name,
            endpoint,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                payload
            );
            return Ok(UpdateOutcome::Applied);
        }

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            return Ok(UpdateOutcome::Applied);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        if let Some(hint) = status_hint(status.as_u16()) {
            tracing::warn!("Cloudflare rejected update ({}): {}", status, hint);
        }

        Ok(UpdateOutcome::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn record_name(&self) -> &str {
        &self.record.name
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare updaters
pub struct CloudflareFactory;

impl DnsUpdaterFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsUpdater>> {
        match config {
            ProviderConfig::Cloudflare { credentials } => {
                // Check for dry-run mode environment variable
                let dry_run = std::env::var("TUNNEL_DNS_MODE")
                    .unwrap_or_default()
                    .to_lowercase()
                    == "dry-run";

                if dry_run {
                    tracing::warn!(
                        "Cloudflare updater running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(CloudflareUpdater::new(credentials, dry_run)?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare updater")),
        }
    }
}

/// Register the Cloudflare updater with a registry
///
/// # Example
///
/// ```rust
/// use tunnel_dns_core::Registry;
///
/// let registry = Registry::new();
/// tunnel_dns_cloudflare::register(&registry);
/// assert!(registry.has_updater("cloudflare"));
/// ```
pub fn register(registry: &Registry) {
    registry.register_updater("cloudflare", Box::new(CloudflareFactory));
}
