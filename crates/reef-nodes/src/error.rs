//! Error types for node collection configuration.

/// Errors that can occur while loading parallel execution options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// The offending option.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
