//! Configuration management and validation.
//!
//! Provides the converter configuration shared by the batch driver and the
//! CLI, the MagIC data model selection, and loading of optional TOML
//! configuration files that sit underneath command-line flags.

use crate::constants::{DEFAULT_CITATION, DEFAULT_OUTPUT_DIR};
use crate::error::{MagicError, Result};
use crate::naming::NameRule;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// MagIC data model version of the emitted tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataModel {
    /// Data model 2.5 (`magic_measurements`, `er_specimens`, ...)
    #[value(name = "2")]
    V2,
    /// Data model 3.0
    #[default]
    #[value(name = "3")]
    V3,
}

impl TryFrom<u8> for DataModel {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            2 => Ok(DataModel::V2),
            3 => Ok(DataModel::V3),
            other => Err(format!("unsupported data model {}, expected 2 or 3", other)),
        }
    }
}

impl From<DataModel> for u8 {
    fn from(model: DataModel) -> Self {
        match model {
            DataModel::V2 => 2,
            DataModel::V3 => 3,
        }
    }
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Global configuration for livdb conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Number of files converted concurrently
    pub workers: usize,

    /// Directory receiving the MagIC tables
    pub output_dir: PathBuf,

    pub data_model: DataModel,

    /// Location name written to every row
    pub location: String,

    /// Specimen to sample naming rule
    pub sample_naming: NameRule,

    /// Sample to site naming rule
    pub site_naming: NameRule,

    pub citation: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            data_model: DataModel::default(),
            location: String::new(),
            sample_naming: NameRule::Same,
            site_naming: NameRule::Same,
            citation: DEFAULT_CITATION.to_string(),
        }
    }
}

impl ConverterConfig {
    /// Load a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MagicError::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ConverterConfig = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_data_model(mut self, data_model: DataModel) -> Self {
        self.data_model = data_model;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the specimen to sample rule
    pub fn with_sample_naming(mut self, rule: NameRule) -> Self {
        self.sample_naming = rule;
        self
    }

    /// Set the sample to site rule
    pub fn with_site_naming(mut self, rule: NameRule) -> Self {
        self.site_naming = rule;
        self
    }

    /// Check the configuration before any processing starts
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(MagicError::invalid_argument(
                "--workers",
                "0",
                "at least one worker is required",
            ));
        }
        validate_rule(&self.sample_naming, "--sample-chars")?;
        validate_rule(&self.site_naming, "--site-chars")?;
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(MagicError::invalid_argument(
                "--output-dir",
                self.output_dir.display().to_string(),
                "not a directory",
            ));
        }
        Ok(())
    }
}

fn validate_rule(rule: &NameRule, flag: &str) -> Result<()> {
    match rule {
        NameRule::TrimTrailing(0) => Err(MagicError::invalid_argument(
            flag,
            "0",
            "number of trailing characters must be positive",
        )),
        NameRule::Delimited(delimiter) if delimiter.is_empty() => Err(
            MagicError::missing_argument(flag, "a delimiter is required for delimited naming"),
        ),
        _ => Ok(()),
    }
}
