//! Per-stage latency records for offline analysis.
//!
//! One line per stage, space separated:
//!
//! ```text
//! Clean <scene> <ms>
//! Restore <frame> <ms>
//! Merge <frame> <ms>
//! Map <frame> <ms>
//! Display <frame> <ms> <vertex_bytes> <face_bytes> <total_bytes> <leftover>
//! Ready <frame> <unix_ms>
//! PP <frame> <ms>
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::orchestrator::IntegrationReport;

/// File name written inside the data directory.
pub const LATENCY_FILE_NAME: &str = "mesh_management_latency.csv";

/// Buffered writer for latency lines.
pub struct LatencyLog {
    out: BufWriter<File>,
}

impl LatencyLog {
    /// Creates (truncating) `mesh_management_latency.csv` inside `dir`.
    pub fn create(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = File::create(dir.join(LATENCY_FILE_NAME))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Records how long applying a deletion list took.
    pub fn record_clean(&mut self, scene_id: u64, elapsed: Duration) -> io::Result<()> {
        writeln!(self.out, "Clean {scene_id} {:.3}", millis(elapsed))
    }

    /// Records the stages of one integrated frame.
    pub fn record_integration(&mut self, report: &IntegrationReport) -> io::Result<()> {
        let frame = report.frame_id;
        writeln!(self.out, "Restore {frame} {:.3}", millis(report.restore))?;
        writeln!(self.out, "Merge {frame} {:.3}", millis(report.merge))?;
        writeln!(self.out, "Map {frame} {:.3}", millis(report.map))?;
        writeln!(
            self.out,
            "Display {frame} {:.3} {} {} {} {}",
            millis(report.total),
            report.vertex_bytes,
            report.face_bytes,
            report.vertex_bytes + report.face_bytes,
            report.leftover
        )?;
        let ready = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        writeln!(self.out, "Ready {frame} {ready}")?;
        writeln!(self.out, "PP {frame} {:.3}", millis(report.post_process))
    }

    /// Flushes buffered lines to disk.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
