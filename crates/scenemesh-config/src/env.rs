//! Environment overrides set by the deployment harness.

use crate::Config;
use crate::error::ConfigError;

/// Number of partial mesh chunks per frame.
pub const ENV_PARTIAL_MESH_COUNT: &str = "PARTIAL_MESH_COUNT";
/// Total number of captured frames in the session.
pub const ENV_FRAME_COUNT: &str = "FRAME_COUNT";
/// Capture rate; with `FRAME_COUNT` it selects the final frame to export.
pub const ENV_FPS: &str = "FPS";

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// `PARTIAL_MESH_COUNT` sets the expected chunk count. When both
    /// `FRAME_COUNT` and `FPS` are set, the last scene
    /// (`FRAME_COUNT / FPS - 1`) is selected for export.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(count) = parse_var(&lookup, ENV_PARTIAL_MESH_COUNT)? {
            self.orchestrator.expected_chunk_count =
                u32::try_from(count).map_err(|_| ConfigError::InvalidEnvVar {
                    name: ENV_PARTIAL_MESH_COUNT,
                    value: count.to_string(),
                })?;
        }

        let frame_count = parse_var(&lookup, ENV_FRAME_COUNT)?;
        let fps = parse_var(&lookup, ENV_FPS)?;
        if let (Some(frame_count), Some(fps)) = (frame_count, fps) {
            if fps == 0 {
                return Err(ConfigError::InvalidEnvVar {
                    name: ENV_FPS,
                    value: fps.to_string(),
                });
            }
            match (frame_count / fps).checked_sub(1) {
                Some(last) => self.export.frame = Some(last),
                None => log::warn!(
                    "{ENV_FRAME_COUNT}={frame_count} covers no full scene at {ENV_FPS}={fps}, keeping export setting"
                ),
            }
        }
        Ok(())
    }
}

fn parse_var<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnvVar { name, value })
}
