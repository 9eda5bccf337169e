//! Configuration error types

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// A configuration value is invalid
    InvalidValue { key: String, value: String, reason: String },
    /// The configuration file could not be read or parsed
    File { path: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "invalid configuration for {key}: '{value}' ({reason})")
            }
            ConfigError::File { path, reason } => {
                write!(f, "cannot load configuration from {path}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
