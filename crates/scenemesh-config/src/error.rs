//! Configuration error types.

/// Errors that can occur when loading, saving, or parsing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// An environment override was not a valid unsigned integer.
    #[error("environment variable {name}={value:?} is not a valid unsigned integer")]
    InvalidEnvVar {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// A setting is out of its valid range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
