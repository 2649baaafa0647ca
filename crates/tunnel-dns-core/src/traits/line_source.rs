// # Line Source Trait
//
// Defines the interface for launching the tunnel agent and reading its output.
//
// ## Implementations
//
// - Child process: `tunnel-dns-process` crate
//
// ## Usage
//
// ```rust,ignore
// use tunnel_dns_core::LineSource;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* LineSource implementation */;
//
//     let mut lines = source.spawn().await?;
//     while let Some(line) = lines.next().await {
//         println!("tunnel: {}", line);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// Stream of output lines from one running tunnel instance
///
/// Lines arrive in the order the tunnel wrote them, without trailing
/// newlines. The stream ends when the tunnel closes its output.
pub type LineStream = Pin<Box<dyn Stream<Item = String> + Send + 'static>>;

/// Trait for line source implementations
///
/// A line source owns the knowledge of *how* to start the tunnel agent.
/// Every call to [`LineSource::spawn`] starts a fresh instance, so the
/// reconciliation loop can relaunch a tunnel that exited.
///
/// # Lifecycle
///
/// - The tunnel is running once `spawn()` returns `Ok`
/// - Dropping the returned stream must stop the tunnel instance
/// - The stream must not busy-poll: reading waits for the next line
///
/// # Boundaries
///
/// Line sources are observers. They must not parse endpoints, touch the
/// reconciliation state or talk to DNS providers.
#[async_trait]
pub trait LineSource: Send + Sync {
    /// Launch the tunnel and return its merged output as a line stream
    ///
    /// # Returns
    ///
    /// - `Ok(LineStream)`: The tunnel is running
    /// - `Err(Error::BinaryNotFound)`: The tunnel executable is missing
    /// - `Err(Error)`: Any other launch failure
    async fn spawn(&self) -> Result<LineStream, crate::Error>;

    /// Human-readable name of the source (for logging)
    fn source_name(&self) -> &str;
}

/// Helper trait for constructing line sources from configuration
pub trait LineSourceFactory: Send + Sync {
    /// Create a LineSource instance from configuration
    fn create(
        &self,
        config: &crate::config::TunnelConfig,
    ) -> Result<Box<dyn LineSource>, crate::Error>;
}
