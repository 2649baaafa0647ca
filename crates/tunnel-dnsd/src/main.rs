// # tunnel-dnsd - Tunnel DNS Daemon
//
// Thin integration layer: all reconciliation logic lives in tunnel-dns-core.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering the line source and DNS updater plugins
// 4. Running the reconciliation loop until a signal or tunnel exit
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Tunnel
// - `TUNNEL_DNS_BINARY`: Tunnel agent executable (default: playit)
// - `TUNNEL_DNS_ARGS`: Whitespace-separated arguments for the agent
// - `TUNNEL_DNS_ON_EXIT`: `terminate` (default) or `restart`
// - `TUNNEL_DNS_RESTART_DELAY_SECS`: Delay before relaunching (default: 5)
//
// ### DNS Provider
// - `TUNNEL_DNS_CREDENTIALS_PATH`: Credential record file (default: credentials.txt)
// - `TUNNEL_DNS_MODE`: `dry-run` logs the update instead of sending it
//
// ### Logging
// - `TUNNEL_DNS_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export TUNNEL_DNS_BINARY=./playit-linux-amd64
// export TUNNEL_DNS_CREDENTIALS_PATH=/etc/tunnel-dns/credentials.txt
// export TUNNEL_DNS_ON_EXIT=restart
//
// tunnel-dnsd
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tunnel_dns_core::{
    Credentials, EngineConfig, ExitPolicy, LoopEvent, ProviderConfig, ReconciliationLoop,
    Registry, TunnelConfig, TunnelDnsConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (including the tunnel exiting)
/// - 3: Tunnel executable not found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TunnelDnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure or tunnel exit)
    RuntimeError = 2,
    /// The tunnel agent binary could not be launched
    BinaryNotFound = 3,
}

impl From<TunnelDnsExitCode> for ExitCode {
    fn from(code: TunnelDnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    binary: String,
    args: Vec<String>,
    credentials_path: String,
    on_exit: String,
    restart_delay_secs: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            binary: lookup("TUNNEL_DNS_BINARY").unwrap_or_else(|| "playit".to_string()),
            args: lookup("TUNNEL_DNS_ARGS")
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            credentials_path: lookup("TUNNEL_DNS_CREDENTIALS_PATH")
                .unwrap_or_else(|| "credentials.txt".to_string()),
            on_exit: lookup("TUNNEL_DNS_ON_EXIT").unwrap_or_else(|| "terminate".to_string()),
            restart_delay_secs: lookup("TUNNEL_DNS_RESTART_DELAY_SECS"),
            log_level: lookup("TUNNEL_DNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate the configuration and build the engine settings
    fn engine_config(&self) -> Result<EngineConfig> {
        if self.binary.trim().is_empty() {
            anyhow::bail!(
                "TUNNEL_DNS_BINARY cannot be empty. \
                Set it via: export TUNNEL_DNS_BINARY=./playit-linux-amd64"
            );
        }

        if self.credentials_path.trim().is_empty() {
            anyhow::bail!("TUNNEL_DNS_CREDENTIALS_PATH cannot be empty");
        }

        let on_tunnel_exit: ExitPolicy = self
            .on_exit
            .parse()
            .context("TUNNEL_DNS_ON_EXIT is not valid")?;

        let mut engine = EngineConfig {
            on_tunnel_exit,
            ..EngineConfig::default()
        };

        if let Some(ref delay) = self.restart_delay_secs {
            let delay: u64 = delay.trim().parse().with_context(|| {
                format!("TUNNEL_DNS_RESTART_DELAY_SECS must be a number. Got: {}", delay)
            })?;
            if delay > 3600 {
                anyhow::bail!(
                    "TUNNEL_DNS_RESTART_DELAY_SECS must be at most 3600 seconds. Got: {}",
                    delay
                );
            }
            engine.restart_delay_secs = delay;
        }

        if engine.on_tunnel_exit == ExitPolicy::Restart && engine.restart_delay_secs == 0 {
            anyhow::bail!(
                "TUNNEL_DNS_RESTART_DELAY_SECS must be at least 1 second when \
                TUNNEL_DNS_ON_EXIT=restart, or a tunnel failing at startup is relaunched \
                in a tight loop"
            );
        }

        self.log_level()?;

        Ok(engine)
    }

    /// Parse the configured log level
    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "TUNNEL_DNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    let config = Config::from_env();

    let engine_config = match config.engine_config() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return TunnelDnsExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TunnelDnsExitCode::ConfigError.into();
    }

    info!("Starting tunnel-dnsd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TunnelDnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config, engine_config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config, engine_config: EngineConfig) -> TunnelDnsExitCode {
    let (mut engine, events) = match build_loop(&config, engine_config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return TunnelDnsExitCode::ConfigError;
        }
    };

    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => {
                // Dropping the sender would stop the loop
                error!("Shutdown signal error: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(());
    });

    match engine.run_with_shutdown(Some(shutdown_rx)).await {
        Ok(()) => {
            info!("Shutting down daemon");
            TunnelDnsExitCode::CleanShutdown
        }
        Err(e) if e.is_binary_not_found() => {
            error!("{}", e);
            error!(
                "Download the tunnel agent for your platform (e.g. ./playit-linux-amd64), \
                make it executable and point TUNNEL_DNS_BINARY at it"
            );
            TunnelDnsExitCode::BinaryNotFound
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            TunnelDnsExitCode::RuntimeError
        }
    }
}

/// Register plugins and assemble the reconciliation loop
async fn build_loop(
    config: &Config,
    engine_config: EngineConfig,
) -> Result<(ReconciliationLoop, mpsc::Receiver<LoopEvent>)> {
    let registry = Registry::new();

    #[cfg(feature = "process")]
    {
        info!("Registering process line source");
        tunnel_dns_process::register(&registry);
    }

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare updater");
        tunnel_dns_cloudflare::register(&registry);
    }

    let credentials = Credentials::load(&config.credentials_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load credentials from {}. \
                Create it with CLOUDFLARE_API_TOKEN, ZONE_ID and DNS_RECORD entries",
                config.credentials_path
            )
        })?;

    let mut settings = TunnelDnsConfig::new(
        TunnelConfig::process(config.binary.clone(), config.args.clone()),
        ProviderConfig::Cloudflare { credentials },
    );
    settings.engine = engine_config;
    settings.validate()?;

    info!("Tunnel binary: {}", config.binary);
    info!("On tunnel exit: {:?}", settings.engine.on_tunnel_exit);

    let source = registry.create_line_source(&settings.tunnel)?;
    let updater = registry.create_updater(&settings.provider)?;
    info!(
        "Managing {} record: {}",
        updater.provider_name(),
        updater.record_name()
    );

    Ok(ReconciliationLoop::new(source, updater, &settings.engine)?)
}

/// Drain loop events into the log
async fn log_events(mut events: mpsc::Receiver<LoopEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            LoopEvent::TunnelExited { attempt } => {
                warn!("Tunnel instance #{} exited", attempt)
            }
            other => debug!("Loop event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
