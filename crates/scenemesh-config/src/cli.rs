//! Command-line argument parsing for scenemesh binaries.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Common scenemesh command-line arguments.
///
/// CLI values override settings loaded from `config.ron` and the environment.
#[derive(Parser, Debug, Default)]
#[command(name = "scenemesh", about = "Incremental scene mesh integration")]
pub struct CliArgs {
    /// Number of partial mesh chunks per frame.
    #[arg(long)]
    pub chunks: Option<u32>,

    /// Discard a partial frame after this many milliseconds (0 = never).
    #[arg(long)]
    pub stall_timeout_ms: Option<u64>,

    /// Directory for OBJ exports.
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Frame id to export after integration.
    #[arg(long)]
    pub export_frame: Option<u64>,

    /// Record per-stage latency to `mesh_management_latency.csv`.
    #[arg(long)]
    pub record_latency: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(chunks) = args.chunks {
            self.orchestrator.expected_chunk_count = chunks;
        }
        if let Some(timeout) = args.stall_timeout_ms {
            self.orchestrator.stall_timeout_ms = timeout;
        }
        if let Some(ref dir) = args.export_dir {
            self.export.directory = dir.clone();
        }
        if let Some(frame) = args.export_frame {
            self.export.frame = Some(frame);
        }
        if let Some(record) = args.record_latency {
            self.debug.record_latency = record;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
