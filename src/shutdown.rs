//! Graceful shutdown coordination
//!
//! On SIGTERM or SIGINT the coordinator cancels its token, so the HTTP
//! server stops accepting connections and readiness turns false. It then
//! waits for in-flight validations to drop their resolved graphs, and
//! finally runs the registered [`ShutdownHandler`]s. The whole sequence is
//! bounded by `graceful_shutdown_timeout_secs`.
//!
//! # Example
//!
//! ```rust,no_run
//! use rdfshape_mcp::shutdown::{ShutdownConfig, ShutdownCoordinator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let coordinator = ShutdownCoordinator::new(ShutdownConfig::default());
//! let token = coordinator.token();
//! coordinator.wait_for_signal().await;
//! coordinator.shutdown().await?;
//! assert!(token.is_cancelled());
//! # Ok(())
//! # }
//! ```

use crate::resolve::ResourceTracker;
use anyhow::Result;
use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Wait for in-flight requests timeout
    pub in_flight_timeout: Duration,

    /// Total maximum shutdown time before force termination
    pub total_timeout: Duration,

    /// Interval between checks of the in-flight counters
    pub poll_interval: Duration,

    /// Whether to enable force shutdown after timeout
    pub force_shutdown_on_timeout: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            in_flight_timeout: Duration::from_secs(25),
            total_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            force_shutdown_on_timeout: true,
        }
    }
}

impl ShutdownConfig {
    /// Create a shutdown config with custom total timeout
    pub fn with_total_timeout(mut self, timeout_secs: u64) -> Self {
        self.total_timeout = Duration::from_secs(timeout_secs);
        self.in_flight_timeout = self.in_flight_timeout.min(self.total_timeout);
        self
    }

    /// Create a shutdown config with custom in-flight timeout
    pub fn with_in_flight_timeout(mut self, timeout_secs: u64) -> Self {
        self.in_flight_timeout = Duration::from_secs(timeout_secs);
        self
    }
}

/// Shutdown phase tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Server is running normally
    Running,
    /// New requests are refused
    StopAccepting,
    /// Waiting for in-flight requests and their graphs
    WaitingInFlight,
    /// Running component handlers
    Cleanup,
    /// Shutdown complete
    Complete,
    /// Force shutdown due to timeout
    Forced,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::StopAccepting => write!(f, "stop_accepting"),
            ShutdownPhase::WaitingInFlight => write!(f, "waiting_in_flight"),
            ShutdownPhase::Cleanup => write!(f, "cleanup"),
            ShutdownPhase::Complete => write!(f, "complete"),
            ShutdownPhase::Forced => write!(f, "forced"),
        }
    }
}

/// Coordinates graceful shutdown across all server components
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    phase: RwLock<ShutdownPhase>,
    shutdown_token: CancellationToken,
    tracker: Option<ResourceTracker>,
    handlers: CompositeShutdownHandler,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            phase: RwLock::new(ShutdownPhase::Running),
            shutdown_token: CancellationToken::new(),
            tracker: None,
            handlers: CompositeShutdownHandler::new(),
        }
    }

    /// Also waits for the graphs counted by `tracker` to be released.
    pub fn with_tracker(mut self, tracker: ResourceTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_handler(mut self, handler: Box<dyn ShutdownHandler>) -> Self {
        self.handlers.add_handler(handler);
        self
    }

    /// Get a shutdown token that can be used to coordinate async task cancellation
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.read()
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        *self.phase.write() = phase;
    }

    /// Graphs still held by in-flight requests.
    pub fn live_graphs(&self) -> usize {
        self.tracker.as_ref().map_or(0, ResourceTracker::live)
    }

    /// Wait for a shutdown signal (SIGTERM or SIGINT), or for the token to be
    /// cancelled elsewhere.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    warn!(%error, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("received SIGTERM, initiating graceful shutdown");
            },
            _ = self.shutdown_token.cancelled() => {
                info!("shutdown requested");
            },
        }
        self.set_phase(ShutdownPhase::StopAccepting);
        self.shutdown_token.cancel();
    }

    /// Execute graceful shutdown with all phases
    pub async fn shutdown(&self) -> Result<()> {
        info!("starting graceful shutdown sequence");
        self.set_phase(ShutdownPhase::StopAccepting);
        self.shutdown_token.cancel();

        let outcome = timeout(self.config.total_timeout, self.run_shutdown_phases()).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                error!(
                    timeout_secs = self.config.total_timeout.as_secs(),
                    "graceful shutdown exceeded total timeout"
                );
                Err(anyhow::anyhow!("shutdown timeout exceeded"))
            }
        };

        match result {
            Ok(()) => {
                info!("graceful shutdown completed successfully");
                self.set_phase(ShutdownPhase::Complete);
                Ok(())
            }
            Err(e) if self.config.force_shutdown_on_timeout => {
                warn!("graceful shutdown failed, forcing shutdown: {}", e);
                self.set_phase(ShutdownPhase::Forced);
                Ok(())
            }
            Err(e) => {
                error!("graceful shutdown failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_shutdown_phases(&self) -> Result<()> {
        self.phase_wait_in_flight().await;

        self.set_phase(ShutdownPhase::Cleanup);
        info!("running shutdown handlers");
        self.handlers.flush().await?;
        self.handlers.shutdown().await
    }

    async fn phase_wait_in_flight(&self) {
        self.set_phase(ShutdownPhase::WaitingInFlight);
        info!("waiting for in-flight requests to complete");

        let deadline = tokio::time::Instant::now() + self.config.in_flight_timeout;
        loop {
            let graphs = self.live_graphs();
            if graphs == 0 {
                info!("all in-flight requests completed");
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(live_graphs = graphs, "in-flight timeout reached, proceeding");
                return;
            }
            debug!(live_graphs = graphs, "waiting for requests to release their graphs");
            sleep(self.config.poll_interval).await;
        }
    }
}

/// Trait for components that need graceful shutdown
#[async_trait::async_trait]
pub trait ShutdownHandler: Send + Sync {
    /// Perform graceful shutdown of this component
    async fn shutdown(&self) -> Result<()>;

    /// Flush any pending data
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Flushes buffered OpenTelemetry spans.
pub struct TelemetryShutdownHandler;

#[async_trait::async_trait]
impl ShutdownHandler for TelemetryShutdownHandler {
    async fn shutdown(&self) -> Result<()> {
        crate::logging::shutdown_telemetry();
        Ok(())
    }
}

/// Composite shutdown handler that runs multiple handlers in sequence
pub struct CompositeShutdownHandler {
    handlers: Vec<Box<dyn ShutdownHandler>>,
}

impl CompositeShutdownHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Box<dyn ShutdownHandler>) {
        self.handlers.push(handler);
    }
}

impl Default for CompositeShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ShutdownHandler for CompositeShutdownHandler {
    async fn shutdown(&self) -> Result<()> {
        for (idx, handler) in self.handlers.iter().enumerate() {
            if let Err(e) = handler.shutdown().await {
                error!(handler_index = idx, "shutdown handler error: {}", e);
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        for (idx, handler) in self.handlers.iter().enumerate() {
            if let Err(e) = handler.flush().await {
                error!(handler_index = idx, "flush handler error: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn quick() -> ShutdownConfig {
        ShutdownConfig {
            in_flight_timeout: Duration::from_millis(200),
            total_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            force_shutdown_on_timeout: true,
        }
    }

    #[test]
    fn test_shutdown_config_builder() {
        let config = ShutdownConfig::default().with_total_timeout(10);
        assert_eq!(config.total_timeout, Duration::from_secs(10));
        assert_eq!(config.in_flight_timeout, Duration::from_secs(10));

        let config = ShutdownConfig::default().with_in_flight_timeout(5);
        assert_eq!(config.in_flight_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_shutdown_runs_handlers_and_cancels_token() {
        struct Flag(Arc<AtomicBool>);

        #[async_trait::async_trait]
        impl ShutdownHandler for Flag {
            async fn shutdown(&self) -> Result<()> {
                self.0.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let ran = Arc::new(AtomicBool::new(false));
        let coordinator = ShutdownCoordinator::new(quick()).with_handler(Box::new(Flag(ran.clone())));
        let token = coordinator.token();
        assert_eq!(coordinator.phase(), ShutdownPhase::Running);

        coordinator.shutdown().await.unwrap();
        assert!(token.is_cancelled());
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(coordinator.phase(), ShutdownPhase::Complete);
    }

    #[tokio::test]
    async fn test_shutdown_without_tracker_has_nothing_to_wait_for() {
        let coordinator = ShutdownCoordinator::new(quick());
        assert_eq!(coordinator.live_graphs(), 0);
        coordinator.shutdown().await.unwrap();
        assert_eq!(coordinator.phase(), ShutdownPhase::Complete);
    }

    #[test]
    fn test_shutdown_phase_display() {
        assert_eq!(ShutdownPhase::Running.to_string(), "running");
        assert_eq!(ShutdownPhase::StopAccepting.to_string(), "stop_accepting");
        assert_eq!(ShutdownPhase::WaitingInFlight.to_string(), "waiting_in_flight");
        assert_eq!(ShutdownPhase::Cleanup.to_string(), "cleanup");
        assert_eq!(ShutdownPhase::Complete.to_string(), "complete");
        assert_eq!(ShutdownPhase::Forced.to_string(), "forced");
    }
}
