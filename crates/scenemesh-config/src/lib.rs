//! Configuration system for scenemesh.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports CLI overrides via clap, environment overrides from the capture
//! harness, hot-reload detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod env;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, ExportConfig, OrchestratorConfig, StoreConfig};
pub use env::{ENV_FPS, ENV_FRAME_COUNT, ENV_PARTIAL_MESH_COUNT};
pub use error::ConfigError;
