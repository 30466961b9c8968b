//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level scene mesh configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Frame integration settings.
    pub orchestrator: OrchestratorConfig,
    /// Mesh store reservations.
    pub store: StoreConfig,
    /// Verification export settings.
    pub export: ExportConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Frame integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Number of partial mesh chunks that make up one frame (reconstruction parallelism).
    pub expected_chunk_count: u32,
    /// Discard a partially received frame after this many milliseconds (0 = wait forever).
    pub stall_timeout_ms: u64,
    /// How often the integration thread wakes to check for stalled frames.
    pub poll_interval_ms: u64,
}

/// Mesh store reservations, in face slots (one triangle each).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Face slots reserved in the vertex and face buffers.
    pub reserved_face_slots: usize,
    /// Face slots covered by the precomputed face-index table.
    pub face_table_slots: usize,
    /// Voxel blocks reserved in the block index.
    pub reserved_blocks: usize,
}

/// Verification export configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory that receives `<frame>.obj` files.
    pub directory: PathBuf,
    /// Frame id to export after integration, if any.
    pub frame: Option<u64>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Append per-stage timings to `mesh_management_latency.csv`.
    pub record_latency: bool,
    /// Directory for latency records and debug log files.
    pub data_dir: PathBuf,
}

// --- Default implementations ---

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            expected_chunk_count: 4,
            stall_timeout_ms: 0,
            poll_interval_ms: 50,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reserved_face_slots: 1 << 16,
            face_table_slots: 1 << 18,
            reserved_blocks: 25_600,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
            frame: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            record_latency: false,
            data_dir: PathBuf::from("recorded_data"),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for scenemesh (e.g. `~/.config/scenemesh`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scenemesh"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Rejects settings the integration pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.expected_chunk_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.expected_chunk_count",
                reason: "a frame needs at least one chunk".to_string(),
            });
        }
        if self.orchestrator.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.poll_interval_ms",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("expected_chunk_count: 4"));
        assert!(ron_str.contains("record_latency: false"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.export.frame = Some(29);
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let ron_str = "(orchestrator: (expected_chunk_count: 8))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.orchestrator.expected_chunk_count, 8);
        assert_eq!(config.orchestrator.poll_interval_ms, 50);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.orchestrator.expected_chunk_count = 6;
        config.export.directory = PathBuf::from("/tmp/meshes");

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.orchestrator.stall_timeout_ms = 500;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().orchestrator.stall_timeout_ms, 500);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunks() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.orchestrator.expected_chunk_count = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "orchestrator.expected_chunk_count", .. })
        ));
    }
}
