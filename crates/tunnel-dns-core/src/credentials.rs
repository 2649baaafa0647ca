//! Credential record for the DNS provider
//!
//! The credential record names the API token, the zone and the one SRV
//! record that the reconciliation loop rewrites. It is produced by an
//! external setup step and only *read* here.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "api_token": "...",
//!   "zone_id": "023e105f4ecef8ad9ca31a8372d0c353",
//!   "dns_record": {
//!     "id": "372e67954025e0ba6aaa6d586b9e0b59",
//!     "name": "_minecraft._tcp.example.com",
//!     "type": "SRV"
//!   }
//! }
//! ```
//!
//! Files written by older setup tooling use the keys `CLOUDFLARE_API_TOKEN`,
//! `ZONE_ID` and `DNS_RECORD`; both spellings are accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Record type the updater knows how to rewrite
pub const SUPPORTED_RECORD_TYPE: &str = "SRV";

/// API token, zone and target record for the DNS provider
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Provider API token
    /// ⚠️ NEVER log this value
    #[serde(alias = "CLOUDFLARE_API_TOKEN")]
    pub api_token: String,

    /// Zone containing the record
    #[serde(alias = "ZONE_ID")]
    pub zone_id: String,

    /// The record to rewrite
    #[serde(alias = "DNS_RECORD")]
    pub dns_record: DnsRecordDescriptor,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("dns_record", &self.dns_record)
            .finish()
    }
}

/// Descriptor of the DNS record selected during setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecordDescriptor {
    /// Provider-side record ID
    pub id: String,

    /// Fully qualified record name
    pub name: String,

    /// Record type (expected to be "SRV")
    #[serde(rename = "type")]
    pub record_type: String,

    /// Any other fields the provider returned for the record
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DnsRecordDescriptor {
    /// Create a descriptor with no extra fields
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        record_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            record_type: record_type.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Credentials {
    /// Create a new credential record
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        dns_record: DnsRecordDescriptor,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            zone_id: zone_id.into(),
            dns_record,
        }
    }

    /// Parse and validate a credential record from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let credentials: Self = serde_json::from_str(json)
            .map_err(|e| Error::credentials(format!("Invalid credential record: {}", e)))?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Read, parse and validate a credential file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::credentials(format!(
                "Failed to read credential file {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!("Loaded credential file {}", path.display());
        Self::from_json_str(&content)
    }

    /// Validate the credential record
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(Error::credentials("API token cannot be empty"));
        }
        if self.zone_id.trim().is_empty() {
            return Err(Error::credentials("Zone ID cannot be empty"));
        }
        if self.dns_record.id.trim().is_empty() {
            return Err(Error::credentials("DNS record ID cannot be empty"));
        }
        if !self
            .dns_record
            .record_type
            .eq_ignore_ascii_case(SUPPORTED_RECORD_TYPE)
        {
            return Err(Error::credentials(format!(
                "DNS record {} has type {}, only {} records are supported",
                self.dns_record.name, self.dns_record.record_type, SUPPORTED_RECORD_TYPE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Credentials {
        Credentials::new(
            "secret_token_12345",
            "zone-1",
            DnsRecordDescriptor::new("record-1", "_minecraft._tcp.example.com", "SRV"),
        )
    }

    #[test]
    fn test_parse_current_format() {
        let json = r#"{
            "api_token": "tok",
            "zone_id": "zone-1",
            "dns_record": {"id": "record-1", "name": "_mc._tcp.example.com", "type": "SRV"}
        }"#;

        let credentials = Credentials::from_json_str(json).unwrap();
        assert_eq!(credentials.api_token, "tok");
        assert_eq!(credentials.zone_id, "zone-1");
        assert_eq!(credentials.dns_record.id, "record-1");
        assert!(credentials.dns_record.extra.is_empty());
    }

    #[test]
    fn test_parse_legacy_format_keeps_extra_fields() {
        let json = r#"{
            "CLOUDFLARE_API_TOKEN": "tok",
            "ZONE_ID": "zone-1",
            "DNS_RECORD": {
                "id": "record-1",
                "name": "_mc._tcp.example.com",
                "type": "SRV",
                "ttl": 1,
                "data": {"port": 25565, "target": "old.example.com"}
            }
        }"#;

        let credentials = Credentials::from_json_str(json).unwrap();
        assert_eq!(credentials.api_token, "tok");
        assert_eq!(credentials.dns_record.name, "_mc._tcp.example.com");
        assert_eq!(credentials.dns_record.extra["ttl"], 1);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut credentials = sample();
        credentials.api_token = String::new();
        assert!(credentials.validate().is_err());

        let mut credentials = sample();
        credentials.zone_id = "  ".to_string();
        assert!(credentials.validate().is_err());

        let mut credentials = sample();
        credentials.dns_record.id = String::new();
        assert!(credentials.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_srv_record() {
        let mut credentials = sample();
        credentials.dns_record.record_type = "A".to_string();
        let err = credentials.validate().unwrap_err();
        assert!(err.to_string().contains("only SRV records"));

        credentials.dns_record.record_type = "srv".to_string();
        assert!(credentials.validate().is_ok());
    }

    #[test]
    fn test_malformed_json() {
        let err = Credentials::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let debug_str = format!("{:?}", sample());
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("<REDACTED>"));
        assert!(debug_str.contains("zone-1"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string_pretty(&sample()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let credentials = Credentials::load(file.path()).await.unwrap();
        assert_eq!(credentials, sample());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load(dir.path().join("credentials.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }
}
