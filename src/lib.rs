//! MagIC Converter Library
//!
//! Converts paleomagnetic laboratory instrument files into the
//! tab-delimited MagIC interchange format.
//!
//! This library provides tools for:
//! - Reading Liverpool database (livdb) exports block by block
//! - Normalizing units, sentinels and floating point noise
//! - Inferring lab treatment codes from the declared experiment protocol
//! - Collapsing repeated measurements
//! - Writing and reading MagIC tables for data models 2.5 and 3.0
//! - Converting SQUID microscope scans with operator metadata

pub mod classifier;
pub mod cli;
pub mod collapse;
pub mod config;
pub mod constants;
pub mod emitter;
pub mod error;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod processor;
pub mod protocol;
pub mod reader;
pub mod squid;
pub mod table;

pub use classifier::{ExperimentContext, classify, classify_block};
pub use config::{ConverterConfig, DataModel};
pub use error::{MagicError, Result};
pub use models::{ClassifiedStep, LabTreatment, NormalizedRecord, ProcessingStats, RawRecord};
pub use protocol::{ProtocolEntry, ProtocolTable};
pub use table::{MagicTable, Row};
