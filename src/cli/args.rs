//! Command-line argument parsing and validation
//!
//! This module defines the CLI structure using clap derive macros and
//! turns parsed flags into converter configurations, reporting missing or
//! contradictory flags as [`MagicError`] values that name the flag.

use crate::config::{ConverterConfig, DataModel};
use crate::constants::DEFAULT_SQUID_SEQUENCE;
use crate::error::{MagicError, Result};
use crate::naming::{NameRule, SiteConvention};
use crate::squid::{SquidConfig, SquidMetadata};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// MagIC converter for paleomagnetic laboratory files
///
/// Converts Liverpool database exports and SQUID microscope scans into the
/// tab-delimited MagIC interchange format.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "magic",
    version,
    about = "Convert paleomagnetic laboratory files into MagIC tables",
    long_about = "Converts Liverpool database (livdb) measurement files and SQUID microscope \
                  scans into tab-delimited MagIC tables. Lab treatment codes are inferred \
                  from the declared experiment protocol and each measurement's field state."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Path to configuration file
    ///
    /// TOML settings for the livdb converter. Command-line flags take
    /// precedence over values from the file.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        global = true,
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Convert Liverpool database files into MagIC tables
    Livdb(LivdbArgs),

    /// Convert SQUID microscope scans into MagIC tables
    Squid(SquidArgs),

    /// List the supported experiment types
    Protocols,
}

/// How parent names are derived on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NamingMode {
    /// Parent name equals the child name
    Same,
    /// Drop a number of trailing characters
    Chars,
    /// Drop the last part after a delimiter
    Delimited,
}

/// Arguments for the livdb command
#[derive(Debug, Clone, Parser)]
pub struct LivdbArgs {
    /// Livdb files or directories holding them
    #[arg(value_name = "PATH", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for MagIC tables
    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "DIR",
        help = "Output directory for MagIC tables"
    )]
    pub output_dir: Option<PathBuf>,

    /// Location name written to every row
    #[arg(long = "location", value_name = "NAME")]
    pub location: Option<String>,

    #[arg(long = "sample-naming", value_enum, help = "Specimen to sample naming rule")]
    pub sample_naming: Option<NamingMode>,

    /// Character count (chars) or delimiter (delimited) for sample naming
    #[arg(long = "sample-chars", value_name = "VALUE")]
    pub sample_chars: Option<String>,

    #[arg(long = "site-naming", value_enum, help = "Sample to site naming rule")]
    pub site_naming: Option<NamingMode>,

    /// Character count (chars) or delimiter (delimited) for site naming
    #[arg(long = "site-chars", value_name = "VALUE")]
    pub site_chars: Option<String>,

    #[arg(long = "data-model", value_enum, help = "MagIC data model of the output")]
    pub data_model: Option<DataModel>,

    /// Number of parallel workers
    #[arg(
        short = 'j',
        long = "workers",
        value_name = "COUNT",
        help = "Number of files converted concurrently"
    )]
    pub workers: Option<usize>,
}

impl LivdbArgs {
    /// Layer the flags over a base configuration and validate the result
    pub fn to_config(&self, base: ConverterConfig) -> Result<ConverterConfig> {
        let mut config = base;
        if let Some(output_dir) = &self.output_dir {
            config = config.with_output_dir(output_dir.clone());
        }
        if let Some(location) = &self.location {
            config = config.with_location(location.clone());
        }
        if let Some(mode) = self.sample_naming {
            config = config.with_sample_naming(name_rule(
                mode,
                self.sample_chars.as_deref(),
                "--sample-chars",
            )?);
        }
        if let Some(mode) = self.site_naming {
            config = config.with_site_naming(name_rule(
                mode,
                self.site_chars.as_deref(),
                "--site-chars",
            )?);
        }
        if let Some(data_model) = self.data_model {
            config = config.with_data_model(data_model);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config.validate()?;
        Ok(config)
    }
}

fn name_rule(mode: NamingMode, value: Option<&str>, flag: &str) -> Result<NameRule> {
    match mode {
        NamingMode::Same => Ok(NameRule::Same),
        NamingMode::Chars => {
            let value = value.ok_or_else(|| {
                MagicError::missing_argument(flag, "the number of trailing characters to drop")
            })?;
            let count = value.trim().parse::<usize>().map_err(|_| {
                MagicError::invalid_argument(flag, value, "expected a non-negative integer")
            })?;
            Ok(NameRule::TrimTrailing(count))
        }
        NamingMode::Delimited => {
            let value = value
                .filter(|delimiter| !delimiter.is_empty())
                .ok_or_else(|| MagicError::missing_argument(flag, "the delimiter"))?;
            Ok(NameRule::Delimited(value.to_string()))
        }
    }
}

/// Arguments for the squid command
///
/// Metadata flags are optional at parse time so that a missing one is
/// reported by name through [`SquidMetadata::validate`].
#[derive(Debug, Clone, Default, Parser)]
pub struct SquidArgs {
    /// Directory holding one folder per specimen slide
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Output directory, defaults to the scan directory
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// First measurement sequence number
    #[arg(short = 's', long = "sequence", value_name = "N", default_value_t = DEFAULT_SQUID_SEQUENCE)]
    pub sequence: u64,

    /// First measurement name number, defaults to the sequence number
    #[arg(long = "meas-num", value_name = "N")]
    pub meas_num: Option<u64>,

    #[arg(long = "location", value_name = "NAME")]
    pub location: Option<String>,
    #[arg(long = "location-type", value_name = "TYPE")]
    pub location_type: Option<String>,
    #[arg(long = "geologic-classes", value_name = "LIST")]
    pub geologic_classes: Option<String>,
    #[arg(long = "lithologies", value_name = "LIST")]
    pub lithologies: Option<String>,
    #[arg(long = "lat", value_name = "DEGREES", allow_hyphen_values = true)]
    pub lat: Option<String>,
    #[arg(long = "lon", value_name = "DEGREES", allow_hyphen_values = true)]
    pub lon: Option<String>,
    #[arg(long = "age", value_name = "AGE")]
    pub age: Option<String>,
    #[arg(long = "age-sigma", value_name = "SIGMA")]
    pub age_sigma: Option<String>,
    #[arg(long = "age-low", value_name = "AGE")]
    pub age_low: Option<String>,
    #[arg(long = "age-high", value_name = "AGE")]
    pub age_high: Option<String>,
    #[arg(long = "age-unit", value_name = "UNIT")]
    pub age_unit: Option<String>,
    #[arg(long = "citations", value_name = "LIST")]
    pub citations: Option<String>,
    /// Site name, derived from the sample with --ncn when omitted
    #[arg(long = "site", value_name = "NAME")]
    pub site: Option<String>,
    #[arg(long = "geologic-types", value_name = "LIST")]
    pub geologic_types: Option<String>,
    #[arg(long = "sample", value_name = "NAME")]
    pub sample: Option<String>,
    #[arg(long = "loc-method-codes", value_name = "CODES")]
    pub loc_method_codes: Option<String>,
    #[arg(long = "site-method-codes", value_name = "CODES")]
    pub site_method_codes: Option<String>,
    #[arg(long = "samp-method-codes", value_name = "CODES")]
    pub samp_method_codes: Option<String>,
    #[arg(long = "spec-method-codes", value_name = "CODES")]
    pub spec_method_codes: Option<String>,
    #[arg(long = "meas-method-codes", value_name = "CODES")]
    pub meas_method_codes: Option<String>,
    #[arg(long = "instrument-codes", value_name = "CODES")]
    pub instrument_codes: Option<String>,

    /// Sensor height above the sample surface in micrometres
    #[arg(long = "z-pos", value_name = "MICRONS", allow_hyphen_values = true)]
    pub z_pos: Option<f64>,

    /// Calibration factors are in Oe per unit instead of nT per unit
    #[arg(long = "oe")]
    pub oe: bool,

    /// Sample to site naming convention (1, 2, 3, 4-Z, 5, 7-Z)
    #[arg(long = "ncn", value_name = "CONVENTION")]
    pub ncn: Option<String>,
}

impl SquidArgs {
    /// Build the conversion settings; the metadata is validated on conversion
    pub fn to_config(&self) -> Result<SquidConfig> {
        let dir = self
            .dir
            .clone()
            .ok_or_else(|| MagicError::missing_argument("--dir", "the directory of specimen folders"))?;
        let ncn = self
            .ncn
            .as_deref()
            .map(str::parse::<SiteConvention>)
            .transpose()?;

        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let metadata = SquidMetadata {
            location: text(&self.location),
            location_type: text(&self.location_type),
            geologic_classes: text(&self.geologic_classes),
            lithologies: text(&self.lithologies),
            lat: text(&self.lat),
            lon: text(&self.lon),
            age: self.age.clone(),
            age_sigma: self.age_sigma.clone(),
            age_low: self.age_low.clone(),
            age_high: self.age_high.clone(),
            age_unit: text(&self.age_unit),
            citations: text(&self.citations),
            site: self.site.clone(),
            geologic_types: text(&self.geologic_types),
            sample: text(&self.sample),
            loc_method_codes: text(&self.loc_method_codes),
            site_method_codes: text(&self.site_method_codes),
            samp_method_codes: text(&self.samp_method_codes),
            spec_method_codes: text(&self.spec_method_codes),
            meas_method_codes: text(&self.meas_method_codes),
            instrument_codes: text(&self.instrument_codes),
            z_pos: self.z_pos,
            cgs_units: self.oe,
            ncn,
        };

        Ok(SquidConfig {
            dir,
            sequence: self.sequence,
            meas_num: self.meas_num.unwrap_or(self.sequence),
            metadata,
        })
    }

    /// Where the tables are written
    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output_dir.clone().or_else(|| self.dir.clone())
    }
}

impl Args {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Base converter configuration, from the config file when given
    pub fn base_config(&self) -> Result<ConverterConfig> {
        match &self.config_file {
            Some(path) => ConverterConfig::from_file(path),
            None => Ok(ConverterConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["magic", "protocols"]);
        assert_eq!(args.get_log_level(), "warn");

        args.verbose = 1;
        assert_eq!(args.get_log_level(), "info");

        args.verbose = 2;
        assert_eq!(args.get_log_level(), "debug");

        args.verbose = 3;
        assert_eq!(args.get_log_level(), "trace");

        args.quiet = true;
        assert_eq!(args.get_log_level(), "error");
        assert!(!args.show_progress());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["magic", "-q", "-v", "protocols"]).is_err());
    }

    #[test]
    fn test_livdb_flags_override_base_config() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        let args = parse(&[
            "magic",
            "livdb",
            "a.livdb",
            "b.livdb",
            "-o",
            out.to_str().unwrap(),
            "--location",
            "Timna",
            "--sample-naming",
            "chars",
            "--sample-chars",
            "1",
            "--site-naming",
            "delimited",
            "--site-chars",
            "-",
            "--data-model",
            "2",
            "-j",
            "2",
        ]);

        let Some(Commands::Livdb(livdb)) = &args.command else {
            panic!("expected livdb command");
        };
        assert_eq!(livdb.inputs.len(), 2);

        let config = livdb.to_config(ConverterConfig::default()).unwrap();
        assert_eq!(config.output_dir, out);
        assert_eq!(config.location, "Timna");
        assert_eq!(config.sample_naming, NameRule::TrimTrailing(1));
        assert_eq!(config.site_naming, NameRule::Delimited("-".to_string()));
        assert_eq!(config.data_model, DataModel::V2);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_livdb_naming_requires_value() {
        let args = parse(&["magic", "livdb", "a.livdb", "--sample-naming", "chars"]);
        let Some(Commands::Livdb(livdb)) = &args.command else {
            panic!("expected livdb command");
        };
        let result = livdb.to_config(ConverterConfig::default());
        assert!(matches!(
            result,
            Err(MagicError::MissingArgument { ref flag, .. }) if flag == "--sample-chars"
        ));

        let args = parse(&[
            "magic", "livdb", "a.livdb", "--site-naming", "chars", "--site-chars", "x",
        ]);
        let Some(Commands::Livdb(livdb)) = &args.command else {
            panic!("expected livdb command");
        };
        assert!(matches!(
            livdb.to_config(ConverterConfig::default()),
            Err(MagicError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_livdb_requires_input() {
        assert!(Args::try_parse_from(["magic", "livdb"]).is_err());
    }

    #[test]
    fn test_squid_args_to_config() {
        let args = parse(&[
            "magic",
            "squid",
            "-d",
            "/scans",
            "-s",
            "5",
            "--sample",
            "RSES-57",
            "--lat",
            "-35.2",
            "--ncn",
            "2",
            "--oe",
        ]);
        let Some(Commands::Squid(squid)) = &args.command else {
            panic!("expected squid command");
        };

        let config = squid.to_config().unwrap();
        assert_eq!(config.dir, PathBuf::from("/scans"));
        assert_eq!(config.sequence, 5);
        assert_eq!(config.meas_num, 5);
        assert_eq!(config.metadata.sample, "RSES-57");
        assert_eq!(config.metadata.lat, "-35.2");
        assert_eq!(config.metadata.ncn, Some(SiteConvention::Hyphen));
        assert!(config.metadata.cgs_units);
        assert_eq!(squid.output_dir(), Some(PathBuf::from("/scans")));
    }

    #[test]
    fn test_squid_missing_dir_names_flag() {
        let result = SquidArgs::default().to_config();
        assert!(matches!(
            result,
            Err(MagicError::MissingArgument { ref flag, .. }) if flag == "--dir"
        ));
    }

    #[test]
    fn test_squid_bad_ncn() {
        let args = SquidArgs {
            dir: Some(PathBuf::from("/scans")),
            ncn: Some("6".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            args.to_config(),
            Err(MagicError::InvalidArgument { .. })
        ));
    }
}
