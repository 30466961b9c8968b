//! Frame-synchronised updates of the scene mesh.
//!
//! Reconstruction workers each deliver a [`GeometryChunk`] per frame and the
//! scene-change detector delivers [`DeletionList`]s. The [`UpdateOrchestrator`]
//! integrates a frame into the [`MeshStore`](scenemesh_store::MeshStore) only
//! once all of its chunks have arrived, and defers deletions that race with an
//! integration until the frame is packed. [`OrchestratorService`] runs the
//! orchestrator on its own thread behind a crossbeam channel.

mod error;
mod events;
mod latency;
mod orchestrator;
mod service;

pub use error::OrchestratorError;
pub use events::{DeletionList, GeometryChunk, SceneEvent, UpdateMap};
pub use latency::{LATENCY_FILE_NAME, LatencyLog};
pub use orchestrator::{
    ChunkDisposition, DeletionDisposition, IgnoreReason, IntegrationReport, Phase,
    UpdateOrchestrator,
};
pub use service::{OrchestratorService, ServiceHandle, THREAD_NAME};
