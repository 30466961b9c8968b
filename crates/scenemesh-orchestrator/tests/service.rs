//! Drives the integration thread from several reconstruction workers at once.

use std::time::Duration;

use scenemesh_orchestrator::{
    DeletionList, GeometryChunk, OrchestratorService, SceneEvent, UpdateOrchestrator,
};
use scenemesh_store::{BlockSlot, MeshStore, StagedBlock, VoxelBlockIndex};

const WORKERS: u32 = 4;
const FRAMES: u64 = 12;
const BLOCKS_PER_WORKER: i32 = 6;

fn block_for(worker: u32, n: i32, frame: u64) -> StagedBlock {
    let index = VoxelBlockIndex::new(worker as i32 * 100 + n, n, -(worker as i32));
    // Face count varies per frame so blocks regularly outgrow their ranges.
    let faces = 1 + ((frame as usize + n as usize) % 4);
    StagedBlock::new(index, vec![[frame as f64, n as f64, 0.0]; faces * 3], Vec::new())
}

#[test]
fn test_parallel_workers_integrate_every_frame() {
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<SceneEvent>();
    let (report_tx, report_rx) = crossbeam_channel::unbounded();

    let orchestrator = UpdateOrchestrator::new(MeshStore::new(), WORKERS).unwrap();
    let service = OrchestratorService::new(orchestrator, event_rx, Duration::from_millis(5))
        .with_reports(report_tx)
        .spawn()
        .unwrap();

    // One job channel per worker, as each worker owns a fixed slice of the volume.
    let mut job_senders = Vec::new();
    let mut workers = Vec::new();
    for worker in 0..WORKERS {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<u64>(1);
        let events = event_tx.clone();
        job_senders.push(job_tx);
        workers.push(std::thread::spawn(move || {
            while let Ok(frame) = job_rx.recv() {
                let blocks = (0..BLOCKS_PER_WORKER).map(|n| block_for(worker, n, frame));
                let chunk = GeometryChunk::from_blocks(frame, worker, blocks);
                if events.send(chunk.into()).is_err() {
                    break;
                }
            }
        }));
    }

    for frame in 0..FRAMES {
        if frame > 0 {
            // Everything the workers produce is re-reconstructed, so the
            // previous frame's blocks are stale.
            let stale = (0..WORKERS).flat_map(|w| {
                (0..BLOCKS_PER_WORKER).map(move |n| block_for(w, n, frame - 1).index)
            });
            event_tx.send(DeletionList::new(frame, stale).into()).unwrap();
        }
        for jobs in &job_senders {
            jobs.send(frame).unwrap();
        }
        let report = report_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(report.frame_id, frame);
        assert_eq!(report.staged_blocks, (WORKERS as i32 * BLOCKS_PER_WORKER) as usize);
    }

    drop(job_senders);
    for worker in workers {
        worker.join().unwrap();
    }
    drop(event_tx);

    let orchestrator = service.join().unwrap();
    let store = orchestrator.store();
    store.check_invariants().unwrap();
    assert_eq!(orchestrator.last_integrated_frame(), Some(FRAMES - 1));
    assert_eq!(orchestrator.last_cleaned_scene(), Some(FRAMES - 1));

    let last = FRAMES - 1;
    for worker in 0..WORKERS {
        for n in 0..BLOCKS_PER_WORKER {
            let expected = block_for(worker, n, last);
            let Some(BlockSlot::Occupied(range)) = store.slot(&expected.index) else {
                panic!("block {} is not live", expected.index);
            };
            assert_eq!(range.len(), expected.face_count());
        }
    }
}

#[test]
fn test_deletion_for_unknown_blocks_is_harmless() {
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<SceneEvent>();
    let orchestrator = UpdateOrchestrator::new(MeshStore::new(), 1).unwrap();
    let service = OrchestratorService::new(orchestrator, event_rx, Duration::from_millis(5))
        .spawn()
        .unwrap();

    event_tx
        .send(DeletionList::new(0, [VoxelBlockIndex::new(9, 9, 9)]).into())
        .unwrap();
    drop(event_tx);

    let orchestrator = service.join().unwrap();
    assert_eq!(orchestrator.last_cleaned_scene(), Some(0));
    assert_eq!(orchestrator.store().face_count(), 0);
}
