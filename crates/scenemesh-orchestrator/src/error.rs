//! Orchestrator error types.

use scenemesh_config::ConfigError;
use scenemesh_store::StoreError;

/// Errors that stop frame integration.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The mesh store detected corrupted state; integration must not continue.
    #[error("mesh store invariant violated: {0}")]
    Store(#[from] StoreError),

    /// The configuration cannot drive an orchestrator.
    #[error("invalid orchestrator configuration: {0}")]
    Config(#[from] ConfigError),

    /// [`integrate_pending_frame`](crate::UpdateOrchestrator::integrate_pending_frame)
    /// was called without a complete frame.
    #[error("no complete frame is waiting for integration")]
    NoFrameReady,

    /// The integration thread could not be started.
    #[error("failed to spawn integration thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The integration thread panicked.
    #[error("integration thread panicked")]
    ThreadPanicked,
}
