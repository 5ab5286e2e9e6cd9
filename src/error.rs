//! Error handling for MagIC conversion operations.
//!
//! Provides error types with context for instrument file reading,
//! protocol lookup, argument validation and table output failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MagicError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Input not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Malformed record at line {line}: expected {expected} fields, found {found}")]
    MalformedRecord {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported experiment type '{experiment_type}' for specimen {specimen}")]
    UnknownExperimentType {
        specimen: String,
        experiment_type: String,
    },

    #[error("Missing required argument: {message} (use the {flag} flag)")]
    MissingArgument { flag: String, message: String },

    #[error("Invalid value '{value}' for {flag}: {reason}")]
    InvalidArgument {
        flag: String,
        value: String,
        reason: String,
    },

    #[error("Invalid MagIC table {path}: {reason}")]
    InvalidTable { path: PathBuf, reason: String },

    #[error("Invalid scan info file {path} at line {line}: {reason}")]
    InvalidScanInfo {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl MagicError {
    /// Create a missing argument error naming the flag
    pub fn missing_argument(flag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingArgument {
            flag: flag.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(
        flag: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            flag: flag.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MagicError>;
