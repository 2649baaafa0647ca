//! Configuration types for the tunnel DNS system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelDnsConfig {
    /// How to launch the tunnel agent
    pub tunnel: TunnelConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl TunnelDnsConfig {
    /// Create a configuration with default engine settings
    pub fn new(tunnel: TunnelConfig, provider: ProviderConfig) -> Self {
        Self {
            tunnel,
            provider,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.tunnel.validate()?;
        self.provider.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Tunnel (line source) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TunnelConfig {
    /// Tunnel agent run as a child process
    Process {
        /// Executable to run (path or name looked up in PATH)
        binary: String,
        /// Arguments passed verbatim, without shell interpretation
        #[serde(default)]
        args: Vec<String>,
        /// Number of output lines buffered between the reader and the loop
        #[serde(default = "default_line_buffer")]
        line_buffer: usize,
    },

    /// Custom line source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl TunnelConfig {
    /// Create a process configuration with the default line buffer
    pub fn process(binary: impl Into<String>, args: Vec<String>) -> Self {
        TunnelConfig::Process {
            binary: binary.into(),
            args,
            line_buffer: default_line_buffer(),
        }
    }

    /// Validate the tunnel configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            TunnelConfig::Process {
                binary,
                line_buffer,
                ..
            } => {
                if binary.trim().is_empty() {
                    return Err(crate::Error::config("Tunnel binary cannot be empty"));
                }
                if *line_buffer == 0 {
                    return Err(crate::Error::config("Tunnel line buffer must be > 0"));
                }
                Ok(())
            }
            TunnelConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom line source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom line source config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the line source type name
    pub fn type_name(&self) -> &str {
        match self {
            TunnelConfig::Process { .. } => "process",
            TunnelConfig::Custom { factory, .. } => factory,
        }
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Token, zone and record to rewrite
        credentials: Credentials,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { credentials } => credentials.validate(),
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// What the loop does when the tunnel closes its output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Stop the loop with `Error::TunnelExited`
    #[default]
    Terminate,
    /// Launch a fresh tunnel instance, keeping the reconciliation state
    Restart,
}

impl std::str::FromStr for ExitPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "terminate" => Ok(ExitPolicy::Terminate),
            "restart" => Ok(ExitPolicy::Restart),
            other => Err(crate::Error::config(format!(
                "Unknown tunnel exit policy '{}' (expected terminate or restart)",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Behaviour when the tunnel process closes its output
    #[serde(default)]
    pub on_tunnel_exit: ExitPolicy,

    /// Delay before relaunching the tunnel (in seconds), `Restart` policy only
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,

    /// Capacity of the loop event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            on_tunnel_exit: ExitPolicy::default(),
            restart_delay_secs: default_restart_delay_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_line_buffer() -> usize {
    64
}

fn default_restart_delay_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}
