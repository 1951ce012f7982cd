use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while ingesting, rolling up or persisting windows.
#[derive(Error, Debug)]
pub enum RollupError {
    /// Input could not be parsed
    #[error("Parse error: {message}")]
    Parse {
        /// What went wrong
        message: String,
    },

    /// Timestamp text is not a recognised ISO-8601 instant
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp {
        /// Offending text
        value: String,
        /// Parser message
        reason: String,
    },

    /// Sample failed validation
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    /// Window store misuse
    #[error("Storage error: {0}")]
    Storage(String),

    /// Bad or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Atomic write of a window or state file failed
    #[error("Failed to persist {path}: {source}")]
    Persist {
        /// Destination file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A rollup cycle did not complete
    #[error("Cycle for {window} window failed: {reason}")]
    CycleFailed {
        /// Target window name
        window: String,
        /// Cause
        reason: String,
    },

    /// Other IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for rollup operations
pub type Result<T> = std::result::Result<T, RollupError>;

impl RollupError {
    /// Creates a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Creates a new timestamp rejection
    pub fn invalid_timestamp<V: Into<String>, R: Into<String>>(value: V, reason: R) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new sample rejection
    pub fn invalid_sample<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSample(msg.into())
    }

    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Wraps an IO failure that happened while writing `path`
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the caller can carry on after this error.
    ///
    /// Parse problems only ever cost a sample or an unreadable window;
    /// everything else fails the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::InvalidTimestamp { .. } | Self::InvalidSample(_)
        )
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } | Self::Serialization(_) => "parse",
            Self::InvalidTimestamp { .. } | Self::InvalidSample(_) => "store",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::Persist { .. } | Self::Io(_) => "io",
            Self::CycleFailed { .. } => "cycle",
        }
    }
}
