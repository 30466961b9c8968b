//! Per-frame update pipeline driving the [`MeshStore`].
//!
//! Geometry for a frame arrives as `expected_chunk_count` chunks from parallel
//! reconstruction workers. The frame is integrated only once every chunk is
//! in, and deletion lists that arrive mid-integration are held back until the
//! frame is fully packed, so no deletion ever observes a half-packed frame.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use scenemesh_config::{Config, ConfigError};
use scenemesh_store::{CleanReport, MeshStore, StoreCapacity};

use crate::error::OrchestratorError;
use crate::events::{DeletionList, GeometryChunk, SceneEvent};
use crate::latency::LatencyLog;

/// Where the orchestrator is in the per-frame cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No partial frame is buffered.
    Idle,
    /// Chunks of `current_frame` are being collected.
    Accumulating,
    /// A complete frame is being restored, staged and packed.
    Integrating,
}

/// Why a chunk was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The chunk belongs to a frame that is already integrated, discarded or superseded.
    Stale,
    /// A frame is mid-integration and cannot accept chunks.
    ///
    /// The chunk is not buffered anywhere. If it belonged to the next frame,
    /// that frame can no longer reach the expected chunk count and stalls until
    /// a newer frame supersedes it or the stall timeout discards it.
    IntegrationInProgress,
}

/// What happened to a geometry chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// Buffered; the frame still waits for more chunks.
    Accumulated {
        /// Frame being collected.
        frame_id: u64,
        /// Chunks received so far.
        received: u32,
        /// Chunks needed.
        expected: u32,
    },
    /// The frame is complete and the orchestrator is now [`Phase::Integrating`].
    FrameComplete {
        /// Frame ready for integration.
        frame_id: u64,
    },
    /// Dropped without touching any state.
    Ignored {
        /// Frame the chunk claimed.
        frame_id: u64,
        /// Why it was dropped.
        reason: IgnoreReason,
    },
}

/// What happened to a deletion list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionDisposition {
    /// Applied to the store right away.
    Applied(CleanReport),
    /// Queued until the frame in flight finishes integrating.
    Deferred {
        /// Lists now waiting.
        queued: usize,
    },
}

/// Timings and sizes of one integrated frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegrationReport {
    /// The integrated frame.
    pub frame_id: u64,
    /// Face slots restored from the previous cycle's nullification.
    pub restored_slots: usize,
    /// Distinct voxel blocks staged for packing.
    pub staged_blocks: usize,
    /// Time spent restoring nullified ranges.
    pub restore: Duration,
    /// Time spent staging the frame's chunks.
    pub merge: Duration,
    /// Time spent packing.
    pub map: Duration,
    /// Time from the start of integration until the mesh was up to date.
    pub total: Duration,
    /// Time spent releasing the frame's consumed chunks.
    pub post_process: Duration,
    /// Face slots in the store after packing.
    pub face_slots: usize,
    /// Bytes of vertex positions after packing.
    pub vertex_bytes: usize,
    /// Bytes of face indices after packing.
    pub face_bytes: usize,
    /// Free slots left over and nullified.
    pub leftover: usize,
}

struct ExportPlan {
    frame: u64,
    directory: PathBuf,
}

/// Drives a [`MeshStore`] from geometry chunks and deletion lists.
pub struct UpdateOrchestrator {
    store: MeshStore,
    expected_chunk_count: u32,
    stall_timeout: Option<Duration>,
    phase: Phase,
    current_frame: Option<u64>,
    last_integrated_frame: Option<u64>,
    last_cleaned_scene: Option<u64>,
    chunks_received: u32,
    accumulated: Vec<GeometryChunk>,
    accumulating_since: Option<Instant>,
    pending_deletions: Vec<DeletionList>,
    export: Option<ExportPlan>,
    latency: Option<LatencyLog>,
}

impl UpdateOrchestrator {
    /// Creates an orchestrator that integrates a frame once `expected_chunk_count` chunks arrive.
    pub fn new(store: MeshStore, expected_chunk_count: u32) -> Result<Self, OrchestratorError> {
        if expected_chunk_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.expected_chunk_count",
                reason: "a frame needs at least one chunk".to_string(),
            }
            .into());
        }
        Ok(Self {
            store,
            expected_chunk_count,
            stall_timeout: None,
            phase: Phase::Idle,
            current_frame: None,
            last_integrated_frame: None,
            last_cleaned_scene: None,
            chunks_received: 0,
            accumulated: Vec::with_capacity(expected_chunk_count as usize),
            accumulating_since: None,
            pending_deletions: Vec::new(),
            export: None,
            latency: None,
        })
    }

    /// Builds the store and orchestrator from a validated config.
    pub fn from_config(config: &Config) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let store = MeshStore::with_capacity(StoreCapacity {
            face_slots: config.store.reserved_face_slots,
            face_table_slots: config.store.face_table_slots,
            blocks: config.store.reserved_blocks,
        });

        let stall_timeout = (config.orchestrator.stall_timeout_ms > 0)
            .then(|| Duration::from_millis(config.orchestrator.stall_timeout_ms));
        let mut orchestrator =
            Self::new(store, config.orchestrator.expected_chunk_count)?.with_stall_timeout(stall_timeout);

        if let Some(frame) = config.export.frame {
            orchestrator = orchestrator.with_export(frame, config.export.directory.clone());
        }
        if config.debug.record_latency {
            match LatencyLog::create(&config.debug.data_dir) {
                Ok(log) => orchestrator = orchestrator.with_latency_log(log),
                Err(e) => tracing::warn!(
                    "latency recording disabled, cannot open {}: {e}",
                    config.debug.data_dir.display()
                ),
            }
        }
        Ok(orchestrator)
    }

    /// Discard partial frames older than `timeout` in [`check_stall`](Self::check_stall).
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Export the mesh to `<directory>/<frame>.obj` right after `frame` integrates.
    pub fn with_export(mut self, frame: u64, directory: PathBuf) -> Self {
        self.export = Some(ExportPlan { frame, directory });
        self
    }

    /// Record stage latencies to `log`.
    pub fn with_latency_log(mut self, log: LatencyLog) -> Self {
        self.latency = Some(log);
        self
    }

    // --- Event entry points ---

    /// Dispatches one bus event, integrating the frame if it completes.
    ///
    /// Returns the report of the integrated frame, if any.
    pub fn handle(
        &mut self,
        event: SceneEvent,
    ) -> Result<Option<IntegrationReport>, OrchestratorError> {
        match event {
            SceneEvent::Chunk(chunk) => match self.on_geometry_chunk(chunk) {
                ChunkDisposition::FrameComplete { .. } => self.integrate_pending_frame().map(Some),
                _ => Ok(None),
            },
            SceneEvent::Deletion(list) => {
                self.on_deletion_list(list)?;
                Ok(None)
            }
        }
    }

    /// Buffers a geometry chunk.
    ///
    /// Returns [`ChunkDisposition::FrameComplete`] when the chunk completes its
    /// frame; the caller must then run
    /// [`integrate_pending_frame`](Self::integrate_pending_frame).
    pub fn on_geometry_chunk(&mut self, chunk: GeometryChunk) -> ChunkDisposition {
        let frame_id = chunk.frame_id;

        if self.phase == Phase::Integrating {
            tracing::debug!("chunk {} of frame {frame_id} arrived mid-integration, dropping", chunk.chunk_id);
            return ChunkDisposition::Ignored {
                frame_id,
                reason: IgnoreReason::IntegrationInProgress,
            };
        }

        if is_newer(frame_id, self.current_frame) && is_newer(frame_id, self.last_integrated_frame) {
            if self.phase == Phase::Accumulating {
                tracing::warn!(
                    "frame {frame_id} supersedes frame {:?} with {}/{} chunks, discarding it",
                    self.current_frame,
                    self.chunks_received,
                    self.expected_chunk_count
                );
                self.discard_partial();
            }
            self.current_frame = Some(frame_id);
            self.chunks_received = 1;
            self.accumulating_since = Some(Instant::now());
            self.phase = Phase::Accumulating;
        } else if self.phase == Phase::Accumulating && self.current_frame == Some(frame_id) {
            self.chunks_received += 1;
        } else {
            tracing::debug!(
                "ignoring chunk {} of stale frame {frame_id} (current {:?}, last integrated {:?})",
                chunk.chunk_id,
                self.current_frame,
                self.last_integrated_frame
            );
            return ChunkDisposition::Ignored {
                frame_id,
                reason: IgnoreReason::Stale,
            };
        }

        tracing::debug!(
            "frame {frame_id}: chunk {} with {} blocks ({}/{})",
            chunk.chunk_id,
            chunk.block_count(),
            self.chunks_received,
            self.expected_chunk_count
        );
        self.accumulated.push(chunk);

        if self.chunks_received == self.expected_chunk_count {
            self.phase = Phase::Integrating;
            ChunkDisposition::FrameComplete { frame_id }
        } else {
            ChunkDisposition::Accumulated {
                frame_id,
                received: self.chunks_received,
                expected: self.expected_chunk_count,
            }
        }
    }

    /// Applies a deletion list now, or queues it while a frame is integrating.
    pub fn on_deletion_list(
        &mut self,
        list: DeletionList,
    ) -> Result<DeletionDisposition, OrchestratorError> {
        if self.phase == Phase::Integrating {
            tracing::debug!("deferring deletion list for scene {} until frame integrates", list.scene_id);
            self.pending_deletions.push(list);
            return Ok(DeletionDisposition::Deferred {
                queued: self.pending_deletions.len(),
            });
        }
        self.apply_deletion(list).map(DeletionDisposition::Applied)
    }

    /// Runs restore, stage and pack for the complete frame, then applies any
    /// deletion lists deferred meanwhile and returns to [`Phase::Idle`].
    pub fn integrate_pending_frame(&mut self) -> Result<IntegrationReport, OrchestratorError> {
        let frame_id = match (self.phase, self.current_frame) {
            (Phase::Integrating, Some(frame_id)) => frame_id,
            _ => return Err(OrchestratorError::NoFrameReady),
        };
        let _span = tracing::info_span!("integrate", frame = frame_id).entered();

        let started = Instant::now();
        let restored_slots = self.store.restore_nullified();
        let restored = Instant::now();
        for chunk in &mut self.accumulated {
            self.store
                .stage(std::mem::take(&mut chunk.update_map).into_values().flatten());
        }
        let staged_blocks = self.store.staged_count();
        let staged = Instant::now();

        let leftover = self.store.pack()?;
        let packed = Instant::now();

        // Drop the consumed chunks but keep the allocation for the next frame.
        self.accumulated.clear();
        let post_process = packed.elapsed();

        let stats = self.store.stats();
        let report = IntegrationReport {
            frame_id,
            restored_slots,
            staged_blocks,
            restore: restored - started,
            merge: staged - restored,
            map: packed - staged,
            total: packed - started,
            post_process,
            face_slots: stats.face_slots,
            vertex_bytes: stats.vertex_bytes,
            face_bytes: stats.face_bytes,
            leftover,
        };
        tracing::info!(
            "frame {frame_id} integrated: {staged_blocks} blocks, {} face slots, {leftover} nullified, {:.3} ms",
            report.face_slots,
            report.total.as_secs_f64() * 1000.0
        );

        if let Some(log) = &mut self.latency
            && let Err(e) = log.record_integration(&report).and_then(|()| log.flush())
        {
            tracing::warn!("failed to record latency for frame {frame_id}: {e}");
        }
        self.export_if_requested(frame_id);

        for list in std::mem::take(&mut self.pending_deletions) {
            self.apply_deletion(list)?;
        }

        self.last_integrated_frame = Some(frame_id);
        self.chunks_received = 0;
        self.accumulating_since = None;
        self.phase = Phase::Idle;
        Ok(report)
    }

    /// Discards the partial frame if it has waited longer than the stall timeout.
    ///
    /// Returns `true` if a frame was discarded. Late chunks of that frame are
    /// then ignored as stale.
    pub fn check_stall(&mut self, now: Instant) -> bool {
        let (Some(timeout), Phase::Accumulating, Some(since)) =
            (self.stall_timeout, self.phase, self.accumulating_since)
        else {
            return false;
        };
        if now.saturating_duration_since(since) < timeout {
            return false;
        }
        tracing::warn!(
            "frame {:?} stalled with {}/{} chunks after {timeout:?}, discarding it",
            self.current_frame,
            self.chunks_received,
            self.expected_chunk_count
        );
        self.discard_partial();
        true
    }

    fn discard_partial(&mut self) {
        self.accumulated.clear();
        self.chunks_received = 0;
        self.accumulating_since = None;
        self.phase = Phase::Idle;
    }

    fn apply_deletion(&mut self, list: DeletionList) -> Result<CleanReport, OrchestratorError> {
        let started = Instant::now();
        let report = self.store.clean(&list.blocks);
        self.store.merge_free_ranges()?;
        let elapsed = started.elapsed();

        self.last_cleaned_scene = Some(list.scene_id);
        tracing::info!(
            "scene {} deletion list applied: {} cleared, {} skipped, {:.3} ms",
            list.scene_id,
            report.cleared,
            report.already_empty + report.unknown,
            elapsed.as_secs_f64() * 1000.0
        );
        if let Some(log) = &mut self.latency
            && let Err(e) = log.record_clean(list.scene_id, elapsed)
        {
            tracing::warn!("failed to record latency for scene {}: {e}", list.scene_id);
        }
        Ok(report)
    }

    fn export_if_requested(&self, frame_id: u64) {
        let Some(plan) = &self.export else {
            return;
        };
        if plan.frame != frame_id {
            return;
        }
        if let Err(e) = std::fs::create_dir_all(&plan.directory) {
            tracing::warn!("cannot create export directory {}: {e}", plan.directory.display());
            return;
        }
        let path = plan.directory.join(format!("{frame_id}.obj"));
        if let Err(e) = self.store.export(&path) {
            tracing::warn!("export of frame {frame_id} failed: {e}");
        }
    }

    // --- Accessors ---

    /// The mesh store.
    pub fn store(&self) -> &MeshStore {
        &self.store
    }

    /// Consumes the orchestrator, returning the mesh store.
    pub fn into_store(self) -> MeshStore {
        self.store
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Chunks needed per frame.
    pub fn expected_chunk_count(&self) -> u32 {
        self.expected_chunk_count
    }

    /// Frame currently (or most recently) being collected.
    pub fn current_frame(&self) -> Option<u64> {
        self.current_frame
    }

    /// Last fully integrated frame.
    pub fn last_integrated_frame(&self) -> Option<u64> {
        self.last_integrated_frame
    }

    /// Scene id of the last applied deletion list.
    pub fn last_cleaned_scene(&self) -> Option<u64> {
        self.last_cleaned_scene
    }

    /// Chunks received for the current frame.
    pub fn chunks_received(&self) -> u32 {
        self.chunks_received
    }

    /// Deletion lists waiting for the frame in flight.
    pub fn pending_deletion_count(&self) -> usize {
        self.pending_deletions.len()
    }
}

fn is_newer(frame_id: u64, than: Option<u64>) -> bool {
    than.is_none_or(|than| frame_id > than)
}


#[cfg(test)]
mod tests {
    use super::*;
    use scenemesh_store::{BlockSlot, FaceRange, StagedBlock, VoxelBlockIndex};

    fn vb(x: i32) -> VoxelBlockIndex {
        VoxelBlockIndex::new(x, 0, 0)
    }

    fn chunk(frame_id: u64, chunk_id: u32, blocks: &[(i32, usize)]) -> GeometryChunk {
        GeometryChunk::from_blocks(
            frame_id,
            chunk_id,
            blocks.iter().map(|&(x, faces)| {
                StagedBlock::new(vb(x), vec![[x as f64, 0.0, 0.0]; faces * 3], Vec::new())
            }),
        )
    }

    fn orchestrator(expected: u32) -> UpdateOrchestrator {
        UpdateOrchestrator::new(MeshStore::new(), expected).unwrap()
    }

    fn live(orch: &UpdateOrchestrator, x: i32) -> Option<FaceRange> {
        orch.store().slot(&vb(x)).and_then(|slot| slot.range())
    }

    #[test]
    fn test_frame_integrates_when_all_chunks_arrive() {
        let mut orch = orchestrator(2);

        let first = orch.on_geometry_chunk(chunk(0, 0, &[(0, 2)]));
        assert_eq!(
            first,
            ChunkDisposition::Accumulated { frame_id: 0, received: 1, expected: 2 }
        );
        assert_eq!(orch.phase(), Phase::Accumulating);
        assert_eq!(orch.store().face_count(), 0);

        let second = orch.on_geometry_chunk(chunk(0, 1, &[(1, 3)]));
        assert_eq!(second, ChunkDisposition::FrameComplete { frame_id: 0 });
        assert_eq!(orch.phase(), Phase::Integrating);

        let report = orch.integrate_pending_frame().unwrap();
        assert_eq!(report.frame_id, 0);
        assert_eq!(report.staged_blocks, 2);
        assert_eq!(report.face_slots, 5);
        assert_eq!(report.leftover, 0);
        assert_eq!(orch.phase(), Phase::Idle);
        assert_eq!(orch.last_integrated_frame(), Some(0));
        assert_eq!(live(&orch, 1), Some(FaceRange::new(0, 2)));
        assert_eq!(live(&orch, 0), Some(FaceRange::new(3, 4)));
    }

    #[test]
    fn test_chunks_for_same_block_merge_across_workers() {
        let mut orch = orchestrator(2);
        orch.handle(chunk(0, 0, &[(0, 1)]).into()).unwrap();
        let report = orch.handle(chunk(0, 1, &[(0, 2)]).into()).unwrap().unwrap();

        assert_eq!(report.staged_blocks, 1);
        assert_eq!(live(&orch, 0), Some(FaceRange::new(0, 2)));
    }

    #[test]
    fn test_stale_chunks_ignored() {
        let mut orch = orchestrator(1);
        orch.handle(chunk(5, 0, &[(0, 1)]).into()).unwrap();

        for frame in [3, 5] {
            assert_eq!(
                orch.on_geometry_chunk(chunk(frame, 0, &[(9, 1)])),
                ChunkDisposition::Ignored { frame_id: frame, reason: IgnoreReason::Stale }
            );
        }
        assert_eq!(orch.phase(), Phase::Idle);
        assert!(orch.store().slot(&vb(9)).is_none());
    }

    #[test]
    fn test_newer_frame_supersedes_partial_frame() {
        let mut orch = orchestrator(2);
        orch.on_geometry_chunk(chunk(1, 0, &[(1, 1)]));
        orch.on_geometry_chunk(chunk(2, 0, &[(2, 1)]));
        assert_eq!(orch.current_frame(), Some(2));
        assert_eq!(orch.chunks_received(), 1);

        // The rest of frame 1 is now stale.
        assert!(matches!(
            orch.on_geometry_chunk(chunk(1, 1, &[(1, 1)])),
            ChunkDisposition::Ignored { reason: IgnoreReason::Stale, .. }
        ));

        orch.handle(chunk(2, 1, &[(3, 1)]).into()).unwrap();
        assert!(orch.store().slot(&vb(1)).is_none());
        assert!(live(&orch, 2).is_some());
        assert!(live(&orch, 3).is_some());
    }

    #[test]
    fn test_deletion_applied_immediately_when_idle() {
        let mut orch = orchestrator(1);
        orch.handle(chunk(0, 0, &[(0, 2), (1, 1)]).into()).unwrap();

        let disposition = orch.on_deletion_list(DeletionList::new(0, [vb(0)])).unwrap();
        assert!(matches!(
            disposition,
            DeletionDisposition::Applied(CleanReport { cleared: 1, .. })
        ));
        assert_eq!(orch.store().slot(&vb(0)), Some(BlockSlot::Empty));
        assert_eq!(orch.store().free_ranges(), &[FaceRange::new(0, 1)]);
        assert_eq!(orch.last_cleaned_scene(), Some(0));
    }

    #[test]
    fn test_deletion_applied_immediately_while_accumulating() {
        let mut orch = orchestrator(2);
        orch.handle(chunk(0, 0, &[(0, 1)]).into()).unwrap();
        orch.handle(chunk(0, 1, &[]).into()).unwrap();

        orch.on_geometry_chunk(chunk(1, 0, &[(0, 1)]));
        let disposition = orch.on_deletion_list(DeletionList::new(1, [vb(0)])).unwrap();
        assert!(matches!(disposition, DeletionDisposition::Applied(_)));
        assert_eq!(orch.phase(), Phase::Accumulating);
    }

    #[test]
    fn test_deletion_deferred_during_integration() {
        let mut orch = orchestrator(1);
        orch.handle(chunk(0, 0, &[(0, 2)]).into()).unwrap();

        assert_eq!(
            orch.on_geometry_chunk(chunk(1, 0, &[(1, 3)])),
            ChunkDisposition::FrameComplete { frame_id: 1 }
        );
        let deferred = orch.on_deletion_list(DeletionList::new(7, [vb(0), vb(1)])).unwrap();
        assert_eq!(deferred, DeletionDisposition::Deferred { queued: 1 });
        assert_eq!(orch.pending_deletion_count(), 1);
        // Nothing touched yet.
        assert!(live(&orch, 0).is_some());
        assert_eq!(orch.last_cleaned_scene(), None);

        orch.integrate_pending_frame().unwrap();

        // Frame 1 was fully packed before the deletion ran.
        assert_eq!(orch.store().face_count(), 5);
        assert_eq!(orch.store().slot(&vb(0)), Some(BlockSlot::Empty));
        assert_eq!(orch.store().slot(&vb(1)), Some(BlockSlot::Empty));
        assert_eq!(orch.pending_deletion_count(), 0);
        assert_eq!(orch.last_cleaned_scene(), Some(7));
        assert_eq!(orch.last_integrated_frame(), Some(1));
    }

    #[test]
    fn test_multiple_deferred_deletions_applied_in_order() {
        let mut orch = orchestrator(1);
        orch.handle(chunk(0, 0, &[(0, 1), (1, 1)]).into()).unwrap();
        orch.on_geometry_chunk(chunk(1, 0, &[]));

        orch.on_deletion_list(DeletionList::new(2, [vb(0)])).unwrap();
        orch.on_deletion_list(DeletionList::new(3, [vb(1)])).unwrap();
        orch.integrate_pending_frame().unwrap();

        assert_eq!(orch.last_cleaned_scene(), Some(3));
        assert_eq!(orch.store().free_ranges(), &[FaceRange::new(0, 1)]);
    }

    #[test]
    fn test_chunk_during_integration_ignored() {
        let mut orch = orchestrator(1);
        orch.on_geometry_chunk(chunk(0, 0, &[(0, 1)]));
        assert_eq!(
            orch.on_geometry_chunk(chunk(1, 0, &[(1, 1)])),
            ChunkDisposition::Ignored { frame_id: 1, reason: IgnoreReason::IntegrationInProgress }
        );
    }

    #[test]
    fn test_chunk_dropped_mid_integration_stalls_its_frame() {
        let mut orch = orchestrator(2).with_stall_timeout(Some(Duration::from_secs(60)));
        orch.on_geometry_chunk(chunk(0, 0, &[(0, 1)]));
        orch.on_geometry_chunk(chunk(0, 1, &[(1, 1)]));

        // First chunk of frame 1 arrives before frame 0 is integrated.
        assert!(matches!(
            orch.on_geometry_chunk(chunk(1, 0, &[(2, 1)])),
            ChunkDisposition::Ignored { reason: IgnoreReason::IntegrationInProgress, .. }
        ));
        orch.integrate_pending_frame().unwrap();

        assert!(matches!(
            orch.on_geometry_chunk(chunk(1, 1, &[(3, 1)])),
            ChunkDisposition::Accumulated { frame_id: 1, received: 1, expected: 2 }
        ));
        assert!(orch.check_stall(Instant::now() + Duration::from_secs(120)));
        assert_eq!(orch.last_integrated_frame(), Some(0));
        assert!(orch.store().slot(&vb(2)).is_none());
    }

    #[test]
    fn test_integrate_without_complete_frame_fails() {
        let mut orch = orchestrator(2);
        assert!(matches!(
            orch.integrate_pending_frame(),
            Err(OrchestratorError::NoFrameReady)
        ));
        orch.on_geometry_chunk(chunk(0, 0, &[(0, 1)]));
        assert!(matches!(
            orch.integrate_pending_frame(),
            Err(OrchestratorError::NoFrameReady)
        ));
    }

    #[test]
    fn test_stalled_frame_discarded_after_timeout() {
        let mut orch = orchestrator(2).with_stall_timeout(Some(Duration::from_secs(60)));
        orch.on_geometry_chunk(chunk(0, 0, &[(0, 1)]));

        assert!(!orch.check_stall(Instant::now()));
        assert!(orch.check_stall(Instant::now() + Duration::from_secs(120)));
        assert_eq!(orch.phase(), Phase::Idle);
        assert_eq!(orch.chunks_received(), 0);

        assert!(matches!(
            orch.on_geometry_chunk(chunk(0, 1, &[(0, 1)])),
            ChunkDisposition::Ignored { reason: IgnoreReason::Stale, .. }
        ));
        assert!(matches!(
            orch.on_geometry_chunk(chunk(1, 0, &[(1, 1)])),
            ChunkDisposition::Accumulated { frame_id: 1, received: 1, .. }
        ));
    }

    #[test]
    fn test_no_stall_timeout_waits_forever() {
        let mut orch = orchestrator(2);
        orch.on_geometry_chunk(chunk(0, 0, &[(0, 1)]));
        assert!(!orch.check_stall(Instant::now() + Duration::from_secs(3600)));
        assert_eq!(orch.phase(), Phase::Accumulating);
    }

    #[test]
    fn test_zero_expected_chunks_rejected() {
        assert!(matches!(
            UpdateOrchestrator::new(MeshStore::new(), 0),
            Err(OrchestratorError::Config(_))
        ));
    }

    #[test]
    fn test_reused_range_after_deletion_between_frames() {
        let mut orch = orchestrator(1);
        orch.handle(chunk(0, 0, &[(0, 2)]).into()).unwrap();
        orch.handle(chunk(1, 0, &[(1, 3)]).into()).unwrap();
        orch.handle(DeletionList::new(1, [vb(0)]).into()).unwrap();
        let report = orch.handle(chunk(2, 0, &[(2, 2)]).into()).unwrap().unwrap();

        assert_eq!(live(&orch, 2), Some(FaceRange::new(0, 1)));
        assert_eq!(report.face_slots, 5);
        assert_eq!(report.leftover, 0);
    }

    #[test]
    fn test_export_written_for_configured_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.orchestrator.expected_chunk_count = 1;
        config.export.frame = Some(1);
        config.export.directory = dir.path().join("exports");

        let mut orch = UpdateOrchestrator::from_config(&config).unwrap();
        orch.handle(chunk(0, 0, &[(0, 1)]).into()).unwrap();
        assert!(!dir.path().join("exports").join("0.obj").exists());

        orch.handle(chunk(1, 0, &[(1, 1)]).into()).unwrap();
        let obj = std::fs::read_to_string(dir.path().join("exports").join("1.obj")).unwrap();
        assert_eq!(obj.lines().filter(|l| l.starts_with("f ")).count(), 2);
    }

    #[test]
    fn test_latency_recorded_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.orchestrator.expected_chunk_count = 1;
        config.debug.record_latency = true;
        config.debug.data_dir = dir.path().to_path_buf();

        let mut orch = UpdateOrchestrator::from_config(&config).unwrap();
        orch.handle(chunk(0, 0, &[(0, 1)]).into()).unwrap();
        orch.handle(DeletionList::new(0, [vb(0)]).into()).unwrap();
        drop(orch);

        let text =
            std::fs::read_to_string(dir.path().join(crate::latency::LATENCY_FILE_NAME)).unwrap();
        assert!(text.lines().any(|l| l.starts_with("Map 0 ")));
        assert!(text.lines().any(|l| l.starts_with("Clean 0 ")));
    }
}
