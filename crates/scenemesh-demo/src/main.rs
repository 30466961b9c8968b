//! Synthetic capture session feeding the scene mesh integration pipeline.
//!
//! A pool of reconstruction workers produces one geometry chunk each per frame
//! while a coordinator plays the scene-change detector, retiring random voxel
//! blocks between frames. Configuration is loaded from `config.ron`, then the
//! capture harness environment (`PARTIAL_MESH_COUNT`, `FRAME_COUNT`, `FPS`),
//! then CLI flags.
//!
//! Run with `cargo run -p scenemesh-demo -- --frames 60 --blocks 400`.

use std::process::ExitCode;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::Sender;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use scenemesh_config::{CliArgs, Config};
use scenemesh_orchestrator::{
    DeletionList, GeometryChunk, OrchestratorError, OrchestratorService, SceneEvent,
    UpdateOrchestrator,
};
use scenemesh_store::{StagedBlock, VoxelBlockIndex};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "scenemesh-demo", about = "Synthetic scene mesh integration run")]
struct DemoArgs {
    #[command(flatten)]
    common: CliArgs,

    /// Frames to reconstruct.
    #[arg(long, default_value_t = 30)]
    frames: u64,

    /// Voxel blocks in the synthetic scene.
    #[arg(long, default_value_t = 256)]
    blocks: usize,

    /// Fraction of blocks re-reconstructed each frame.
    #[arg(long, default_value_t = 0.25)]
    churn: f64,

    /// Seed for the synthetic scene.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Blocks one worker must re-reconstruct for a frame.
struct Job {
    frame: u64,
    blocks: Vec<VoxelBlockIndex>,
}

fn main() -> ExitCode {
    let args = DemoArgs::parse();

    let config_dir = args
        .common
        .config
        .clone()
        .or_else(Config::default_dir)
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    if let Err(e) = config.apply_env_overrides() {
        eprintln!("Ignoring environment overrides: {e}");
    }
    config.apply_cli_overrides(&args.common);

    scenemesh_log::init_logging(
        Some(&config.debug.data_dir),
        cfg!(debug_assertions),
        Some(&config),
    );

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("integration failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &DemoArgs, config: &Config) -> Result<(), OrchestratorError> {
    let orchestrator = UpdateOrchestrator::from_config(config)?;
    let worker_count = config.orchestrator.expected_chunk_count;

    let (event_tx, event_rx) = crossbeam_channel::unbounded::<SceneEvent>();
    let (report_tx, report_rx) = crossbeam_channel::unbounded();
    let service = OrchestratorService::new(
        orchestrator,
        event_rx,
        Duration::from_millis(config.orchestrator.poll_interval_ms),
    )
    .with_reports(report_tx)
    .spawn()?;

    let mut jobs = Vec::with_capacity(worker_count as usize);
    let mut workers = Vec::with_capacity(worker_count as usize);
    for worker in 0..worker_count {
        let (job_tx, handle) = spawn_worker(worker, args.seed, event_tx.clone());
        jobs.push(job_tx);
        workers.push(handle);
    }

    let scene = synthetic_scene(args.blocks, args.seed);
    let mut rng = Xoshiro256StarStar::seed_from_u64(args.seed);
    info!(
        "reconstructing {} frames of {} blocks with {worker_count} workers",
        args.frames,
        scene.len()
    );

    for frame in 0..args.frames {
        let changed: Vec<VoxelBlockIndex> = scene
            .iter()
            .copied()
            .filter(|_| frame == 0 || rng.gen_bool(args.churn.clamp(0.0, 1.0)))
            .collect();

        if frame > 0 {
            let stale = changed.iter().copied();
            if event_tx.send(DeletionList::new(frame, stale).into()).is_err() {
                warn!("integration thread gone, stopping at frame {frame}");
                break;
            }
        }

        // Changed blocks carved away entirely get no new geometry.
        let mut shares = vec![Vec::new(); worker_count as usize];
        for block in changed {
            if frame > 0 && rng.gen_bool(0.1) {
                continue;
            }
            shares[block.bucket() as usize % worker_count as usize].push(block);
        }
        for (job_tx, blocks) in jobs.iter().zip(shares) {
            if job_tx.send(Job { frame, blocks }).is_err() {
                warn!("worker exited early at frame {frame}");
            }
        }

        match report_rx.recv_timeout(Duration::from_secs(10)) {
            Ok(report) => info!(
                "frame {}: {} blocks staged, {} face slots, {} nullified",
                report.frame_id, report.staged_blocks, report.face_slots, report.leftover
            ),
            Err(_) => warn!("no integration report for frame {frame}"),
        }
    }

    drop(jobs);
    for handle in workers {
        if handle.join().is_err() {
            warn!("reconstruction worker panicked");
        }
    }
    drop(event_tx);

    let orchestrator = service.join()?;
    let store = orchestrator.store();
    store.check_invariants()?;

    let stats = store.stats();
    info!(
        "final mesh: {} live blocks, {} empty, {} face slots, {} free ranges ({} slots)",
        stats.live_blocks, stats.empty_blocks, stats.face_slots, stats.free_ranges, stats.free_slots
    );
    Ok(())
}

/// Distinct block indices spread over a small volume around the origin.
fn synthetic_scene(blocks: usize, seed: u64) -> Vec<VoxelBlockIndex> {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed ^ 0x5ce4e);
    let mut scene = std::collections::BTreeSet::new();
    let side = ((blocks as f64).cbrt().ceil() as i32).max(1) * 2;
    while scene.len() < blocks {
        scene.insert(VoxelBlockIndex::new(
            rng.gen_range(-side..side),
            rng.gen_range(-side..side),
            rng.gen_range(0..side),
        ));
    }
    scene.into_iter().collect()
}

fn spawn_worker(
    worker: u32,
    seed: u64,
    events: Sender<SceneEvent>,
) -> (Sender<Job>, JoinHandle<()>) {
    let (job_tx, job_rx) = crossbeam_channel::bounded::<Job>(1);
    let handle = std::thread::spawn(move || {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed.wrapping_add(u64::from(worker) + 1));
        while let Ok(job) = job_rx.recv() {
            let blocks = job.blocks.into_iter().map(|index| reconstruct(&mut rng, index));
            let chunk = GeometryChunk::from_blocks(job.frame, worker, blocks);
            if events.send(chunk.into()).is_err() {
                break;
            }
        }
    });
    (job_tx, handle)
}

/// Random triangles inside the block's unit cube.
fn reconstruct(rng: &mut Xoshiro256StarStar, index: VoxelBlockIndex) -> StagedBlock {
    let faces = rng.gen_range(1..=24);
    let base = [f64::from(index.x), f64::from(index.y), f64::from(index.z)];
    let mut vertices = Vec::with_capacity(faces * 3);
    let mut colors = Vec::with_capacity(faces * 3);
    for _ in 0..faces * 3 {
        vertices.push([
            base[0] + rng.r#gen::<f64>(),
            base[1] + rng.r#gen::<f64>(),
            base[2] + rng.r#gen::<f64>(),
        ]);
        colors.push([rng.r#gen::<f64>(), rng.r#gen::<f64>(), rng.r#gen::<f64>()]);
    }
    StagedBlock::new(index, vertices, colors)
}
