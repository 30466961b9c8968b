//! Integration thread: drains the scene event bus into an [`UpdateOrchestrator`].
//!
//! Reconstruction workers and the scene-change detector hold clones of the
//! event [`Sender`](crossbeam_channel::Sender). The service owns the
//! orchestrator exclusively, so the store never needs a lock. Dropping every
//! sender shuts the service down and hands the orchestrator back.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::OrchestratorError;
use crate::events::SceneEvent;
use crate::orchestrator::{IntegrationReport, UpdateOrchestrator};

/// Name of the spawned integration thread.
pub const THREAD_NAME: &str = "scene-integration";

/// Event loop around an [`UpdateOrchestrator`].
pub struct OrchestratorService {
    orchestrator: UpdateOrchestrator,
    events: Receiver<SceneEvent>,
    reports: Option<Sender<IntegrationReport>>,
    poll_interval: Duration,
}

impl OrchestratorService {
    /// Creates a service that wakes at least every `poll_interval` to check for stalled frames.
    pub fn new(
        orchestrator: UpdateOrchestrator,
        events: Receiver<SceneEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            events,
            reports: None,
            poll_interval,
        }
    }

    /// Publish an [`IntegrationReport`] for every integrated frame.
    pub fn with_reports(mut self, reports: Sender<IntegrationReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Processes events until every sender is dropped.
    ///
    /// Returns the orchestrator so the caller can inspect or export the final mesh.
    pub fn run(mut self) -> Result<UpdateOrchestrator, OrchestratorError> {
        tracing::info!(
            "integration loop started, {} chunks per frame",
            self.orchestrator.expected_chunk_count()
        );
        loop {
            match self.events.recv_timeout(self.poll_interval) {
                Ok(event) => {
                    if let Some(report) = self.orchestrator.handle(event)? {
                        self.publish(report);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.orchestrator.check_stall(Instant::now());
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!(
            "event bus closed after frame {:?}, integration loop exiting",
            self.orchestrator.last_integrated_frame()
        );
        Ok(self.orchestrator)
    }

    /// Runs the loop on a dedicated named thread.
    pub fn spawn(self) -> Result<ServiceHandle, OrchestratorError> {
        let handle = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run())
            .map_err(OrchestratorError::Spawn)?;
        Ok(ServiceHandle { handle })
    }

    fn publish(&mut self, report: IntegrationReport) {
        if let Some(reports) = &self.reports
            && reports.send(report).is_err()
        {
            tracing::debug!("report receiver dropped, no longer publishing reports");
            self.reports = None;
        }
    }
}

/// Handle to a spawned [`OrchestratorService`].
pub struct ServiceHandle {
    handle: JoinHandle<Result<UpdateOrchestrator, OrchestratorError>>,
}

impl ServiceHandle {
    /// Waits for the service to exit and returns its orchestrator.
    pub fn join(self) -> Result<UpdateOrchestrator, OrchestratorError> {
        self.handle
            .join()
            .map_err(|_| OrchestratorError::ThreadPanicked)?
    }
}
