//! SQUID microscope scan conversion.
//!
//! A scan directory holds one folder per specimen slide. Each slide's
//! `data/` folder pairs a whitespace-separated grid of field readings with
//! a positional `.inf` description of the scan. Every scan becomes its own
//! measurements table with compressed header lines; the operator-supplied
//! metadata becomes locations, sites, samples and specimens tables.

use crate::constants::{
    DEFAULT_CITATION, QUALITY_GOOD, SQUID_METHOD_CODE, STANDARD_UNKNOWN, tables,
};
use crate::error::{MagicError, Result};
use crate::models::ProcessingStats;
use crate::naming::SiteConvention;
use crate::normalize::{
    clean, micrometers_to_meters, millimeters_to_meters, nanotesla_to_tesla, oersted_to_tesla,
};
use crate::table::{MagicTable, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Directory entries that never hold specimen slides
const SKIPPED_ENTRIES: &[&str] = &["command", "log", "measurements", "images"];

/// Scan geometry and calibration read from an `.inf` file
#[derive(Debug, Clone, PartialEq)]
pub struct ScanInfo {
    /// Start corner in metres
    pub x_start: f64,
    pub y_start: f64,
    /// End corner in metres
    pub x_end: f64,
    pub y_end: f64,
    /// Step sizes in metres
    pub x_step: f64,
    pub y_step: f64,
    pub num_points: f64,
    /// Calibration factor as written (nT or Oe per instrument unit)
    pub calibration: f64,
    pub description: String,
}

const START_CORNER_LINE: usize = 3;
const END_CORNER_LINE: usize = 4;
const X_STEP_LINE: usize = 8;
const Y_STEP_LINE: usize = 9;
const NUM_POINTS_LINE: usize = 16;
const CALIBRATION_LINE: usize = 26;
const DESCRIPTION_LINES: &[usize] = &[11, 12, 13, 15, 16, 20, 22, 26, 30, 31, 32];

struct InfLines<'a> {
    lines: Vec<&'a str>,
    path: &'a Path,
}

impl<'a> InfLines<'a> {
    fn error(&self, line: usize, reason: impl Into<String>) -> MagicError {
        MagicError::InvalidScanInfo {
            path: self.path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }

    fn required(&self, line: usize) -> Result<&'a str> {
        self.lines
            .get(line - 1)
            .copied()
            .ok_or_else(|| self.error(line, "file ends before this line"))
    }

    fn token(&self, line: usize, index: usize) -> Result<f64> {
        let text = self.required(line)?;
        let token = text
            .split_whitespace()
            .nth(index)
            .ok_or_else(|| self.error(line, format!("expected at least {} values", index + 1)))?;
        token
            .parse()
            .map_err(|_| self.error(line, format!("'{}' is not a number", token)))
    }

    /// `(x mm, y mm)` corner coordinates
    fn corner(&self, line: usize) -> Result<(f64, f64)> {
        let text = self.required(line)?;
        let (_, inside) = text
            .split_once('(')
            .ok_or_else(|| self.error(line, "expected a corner like (x mm, y mm)"))?;
        let tokens: Vec<&str> = inside.split_whitespace().collect();
        let number = |index: usize| -> Result<f64> {
            tokens
                .get(index)
                .and_then(|t| t.trim_matches([',', ')']).parse().ok())
                .ok_or_else(|| self.error(line, "expected a corner like (x mm, y mm)"))
        };
        Ok((number(0)?, number(2)?))
    }

    /// Line text without its four-character prefix; missing lines are empty
    fn comment(&self, line: usize) -> String {
        self.lines
            .get(line - 1)
            .map(|text| text.chars().skip(4).collect())
            .unwrap_or_default()
    }
}

impl ScanInfo {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let lines = InfLines {
            lines: text.lines().collect(),
            path,
        };

        let (x_start, y_start) = lines.corner(START_CORNER_LINE)?;
        let (x_end, y_end) = lines.corner(END_CORNER_LINE)?;
        let x_step = lines.token(X_STEP_LINE, 3)?;
        let y_step = lines.token(Y_STEP_LINE, 3)?;
        let num_points = lines.token(NUM_POINTS_LINE, 3)?;
        let calibration = lines.token(CALIBRATION_LINE, 2)?;

        let description = DESCRIPTION_LINES
            .iter()
            .map(|line| lines.comment(*line))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Self {
            x_start: millimeters_to_meters(x_start),
            y_start: millimeters_to_meters(y_start),
            x_end: millimeters_to_meters(x_end),
            y_end: millimeters_to_meters(y_end),
            x_step: micrometers_to_meters(x_step),
            y_step: micrometers_to_meters(y_step),
            num_points,
            calibration,
            description,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::parse(&String::from_utf8_lossy(&bytes), path)
    }

    /// Calibration factor in tesla per instrument unit
    pub fn calibration_tesla(&self, cgs_units: bool) -> f64 {
        if cgs_units {
            oersted_to_tesla(self.calibration)
        } else {
            nanotesla_to_tesla(self.calibration)
        }
    }
}

/// Operator-supplied description of the scanned material
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SquidMetadata {
    pub location: String,
    pub location_type: String,
    pub geologic_classes: String,
    pub lithologies: String,
    pub lat: String,
    pub lon: String,
    pub age: Option<String>,
    pub age_sigma: Option<String>,
    pub age_low: Option<String>,
    pub age_high: Option<String>,
    pub age_unit: String,
    pub citations: String,
    pub site: Option<String>,
    pub geologic_types: String,
    pub sample: String,
    pub loc_method_codes: String,
    pub site_method_codes: String,
    pub samp_method_codes: String,
    pub spec_method_codes: String,
    pub meas_method_codes: String,
    pub instrument_codes: String,
    /// Sensor distance from the surface in micrometres
    pub z_pos: Option<f64>,
    /// Calibration factors are in cgs units
    pub cgs_units: bool,
    pub ncn: Option<SiteConvention>,
}

impl SquidMetadata {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("--location", &self.location, "the location/study name"),
            ("--location-type", &self.location_type, "the location type"),
            ("--geologic-classes", &self.geologic_classes, "the geologic classes"),
            ("--lithologies", &self.lithologies, "the lithologies"),
            ("--lat", &self.lat, "the site latitude"),
            ("--lon", &self.lon, "the site longitude"),
            ("--age-unit", &self.age_unit, "the age unit"),
            ("--geologic-types", &self.geologic_types, "the geologic types"),
            ("--sample", &self.sample, "the sample name"),
        ];
        for (flag, value, what) in required {
            if value.trim().is_empty() {
                return Err(MagicError::missing_argument(flag, format!("{} must be set", what)));
            }
        }
        if self.ncn.is_none() {
            return Err(MagicError::missing_argument(
                "--ncn",
                "the sample naming convention must be set",
            ));
        }
        if self.age.is_none() && self.age_low.is_none() && self.age_high.is_none() {
            return Err(MagicError::missing_argument(
                "--age",
                "an age, or an age range with --age-low/--age-high, must be set",
            ));
        }
        for (flag, value) in [("--lat", &self.lat), ("--lon", &self.lon)] {
            if value.trim().parse::<f64>().is_err() {
                return Err(MagicError::invalid_argument(flag, value.as_str(), "not a number"));
            }
        }
        if self.site_method_codes.is_empty() {
            warn!("No site method codes given; set them with --site-method-codes");
        }
        if self.samp_method_codes.is_empty() {
            warn!("No sample method codes given; set them with --samp-method-codes");
        }
        if self.spec_method_codes.is_empty() {
            warn!("No specimen method codes given; set them with --spec-method-codes");
        }
        Ok(())
    }

    pub fn citations(&self) -> &str {
        if self.citations.trim().is_empty() {
            DEFAULT_CITATION
        } else {
            &self.citations
        }
    }

    /// Measurement method codes, always including the SQUID microscope code
    pub fn measurement_method_codes(&self) -> String {
        let codes = self.meas_method_codes.trim().trim_matches(':');
        if codes.is_empty() {
            SQUID_METHOD_CODE.to_string()
        } else if codes.split(':').any(|code| code.trim() == SQUID_METHOD_CODE) {
            codes.to_string()
        } else {
            format!("{}:{}", codes, SQUID_METHOD_CODE)
        }
    }

    /// Site name given on the command line, or derived from the sample
    pub fn site(&self) -> String {
        match (&self.site, &self.ncn) {
            (Some(site), _) => site.clone(),
            (None, Some(convention)) => convention.site_for(&self.sample),
            (None, None) => self.sample.clone(),
        }
    }

    fn with_ages(&self, mut row: Row) -> Row {
        for (key, value) in [
            ("age", &self.age),
            ("age_sigma", &self.age_sigma),
            ("age_high", &self.age_high),
            ("age_low", &self.age_low),
        ] {
            if let Some(value) = value {
                row.set(key, value.as_str());
            }
        }
        row
    }

    pub fn location_row(&self) -> Row {
        let row = Row::new()
            .with("location", self.location.as_str())
            .with("location_type", self.location_type.as_str())
            .with("geologic_classes", self.geologic_classes.as_str())
            .with("lithologies", self.lithologies.as_str())
            .with("lat_n", self.lat.as_str())
            .with("lat_s", self.lat.as_str())
            .with("lon_w", self.lon.as_str())
            .with("lon_e", self.lon.as_str())
            .with("age_unit", self.age_unit.as_str())
            .with("citations", self.citations())
            .with("method_codes", self.loc_method_codes.as_str());
        self.with_ages(row)
    }

    pub fn site_row(&self) -> Row {
        let row = Row::new()
            .with("site", self.site())
            .with("location", self.location.as_str())
            .with("geologic_classes", self.geologic_classes.as_str())
            .with("geologic_types", self.geologic_types.as_str())
            .with("lithologies", self.lithologies.as_str())
            .with("lat", self.lat.as_str())
            .with("lon", self.lon.as_str())
            .with("age_unit", self.age_unit.as_str())
            .with("citations", self.citations())
            .with("method_codes", self.site_method_codes.as_str());
        self.with_ages(row)
    }

    pub fn sample_row(&self) -> Row {
        Row::new()
            .with("sample", self.sample.as_str())
            .with("site", self.site())
            .with("lat", self.lat.as_str())
            .with("lon", self.lon.as_str())
            .with("geologic_classes", self.geologic_classes.as_str())
            .with("geologic_types", self.geologic_types.as_str())
            .with("lithologies", self.lithologies.as_str())
            .with("citations", self.citations())
            .with("method_codes", self.samp_method_codes.as_str())
    }

    pub fn specimen_row(&self, specimen: &str) -> Row {
        Row::new()
            .with("specimen", specimen)
            .with("sample", self.sample.as_str())
            .with("citations", self.citations())
            .with("method_codes", self.spec_method_codes.as_str())
            .with("geologic_classes", self.geologic_classes.as_str())
            .with("geologic_types", self.geologic_types.as_str())
            .with("lithologies", self.lithologies.as_str())
    }
}

/// Settings of one SQUID conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct SquidConfig {
    /// Directory holding one folder per specimen slide
    pub dir: PathBuf,
    /// First measurement sequence number
    pub sequence: u64,
    /// First measurement name number
    pub meas_num: u64,
    pub metadata: SquidMetadata,
}

/// Running measurement counters, continued across scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub sequence: u64,
    pub meas_num: u64,
}

/// Convert one scan grid into a measurements table
pub fn convert_scan(
    specimen: &str,
    experiment: &str,
    grid: &str,
    info: &ScanInfo,
    metadata: &SquidMetadata,
    counters: &mut Counters,
    source: &Path,
) -> Result<MagicTable> {
    let mut table = MagicTable::new(tables::MEASUREMENTS);
    table.set_constant("experiment", experiment);
    table.set_constant("specimen", specimen);
    table.set_constant("standard", STANDARD_UNKNOWN);
    table.set_constant("quality", QUALITY_GOOD);
    table.set_constant("method_codes", metadata.measurement_method_codes());
    table.set_constant("citations", metadata.citations());
    if !metadata.instrument_codes.is_empty() {
        table.set_constant("instrument_codes", metadata.instrument_codes.as_str());
    }
    if let Some(z_pos) = metadata.z_pos {
        table.set_constant("meas_pos_z", clean(micrometers_to_meters(z_pos)));
    }
    table.set_constant("description", info.description.as_str());
    table.columns = ["measurement", "sequence", "magn_z", "meas_pos_x", "meas_pos_y"]
        .iter()
        .map(|c| c.to_string())
        .collect();

    let calibration = info.calibration_tesla(metadata.cgs_units);
    for (row_index, line) in grid.lines().enumerate() {
        let y = clean(info.y_start + row_index as f64 * info.y_step);
        for (column_index, value) in line.split_whitespace().enumerate() {
            let reading: f64 = value.parse().map_err(|_| MagicError::ProcessingFailed {
                path: source.to_path_buf(),
                reason: format!(
                    "grid value '{}' at row {} column {} is not a number",
                    value,
                    row_index + 1,
                    column_index + 1
                ),
            })?;
            let x = clean(info.x_start + column_index as f64 * info.x_step);
            table.push(
                Row::new()
                    .with("measurement", counters.meas_num.to_string())
                    .with("sequence", counters.sequence.to_string())
                    .with("magn_z", clean(reading * calibration))
                    .with("meas_pos_x", x)
                    .with("meas_pos_y", y.as_str()),
            );
            counters.sequence += 1;
            counters.meas_num += 1;
        }
    }

    if (table.len() as f64) != info.num_points {
        warn!(
            "{}: scan has {} points, but its description lists {}",
            source.display(),
            table.len(),
            info.num_points
        );
    }
    Ok(table)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Specimen slide folders of a scan directory, sorted by name
pub fn specimen_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MagicError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter(|path| {
            let name = file_name(path);
            !name.starts_with('.') && !SKIPPED_ENTRIES.contains(&name.as_str())
        })
        .collect())
}

/// Grid files of a slide's `data` folder, paired with their `.inf` files
pub fn scan_files(data_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    Ok(sorted_entries(data_dir)?
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = file_name(path);
            !name.starts_with('.') && !name.contains(".inf")
        })
        .map(|grid| {
            let info = grid.with_extension("inf");
            (grid, info)
        })
        .collect())
}

fn read_scan(
    specimen: &str,
    grid_path: &Path,
    info_path: &Path,
    metadata: &SquidMetadata,
    counters: &mut Counters,
) -> Result<MagicTable> {
    let info = ScanInfo::from_file(info_path)?;
    let grid = String::from_utf8_lossy(&fs::read(grid_path)?).to_string();
    let experiment = file_name(grid_path)
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string();
    convert_scan(specimen, &experiment, &grid, &info, metadata, counters, grid_path)
}

/// Convert every scan below `config.dir`, writing tables to `output_dir`.
///
/// A scan that cannot be read or converted is counted as failed and
/// skipped; the remaining scans and the metadata tables are still written.
pub fn convert_squid(config: &SquidConfig, output_dir: &Path) -> Result<ProcessingStats> {
    let start_time = Instant::now();
    let metadata = &config.metadata;
    metadata.validate()?;

    let measurements_dir = output_dir.join(tables::MEASUREMENTS);
    fs::create_dir_all(&measurements_dir)?;

    let mut stats = ProcessingStats::default();
    let mut counters = Counters {
        sequence: config.sequence,
        meas_num: config.meas_num,
    };
    let mut specimens = MagicTable::new(tables::SPECIMENS);
    let mut file_number = 1;

    for specimen_dir in specimen_dirs(&config.dir)? {
        let specimen = file_name(&specimen_dir);
        specimens.push(metadata.specimen_row(&specimen));

        let data_dir = specimen_dir.join("data");
        if !data_dir.is_dir() {
            warn!("Specimen {} has no data folder, skipping its scans", specimen);
            continue;
        }

        for (grid_path, info_path) in scan_files(&data_dir)? {
            if !info_path.exists() {
                warn!(
                    "Scan {} has no matching {}, skipping",
                    grid_path.display(),
                    info_path.display()
                );
                stats.files_failed += 1;
                continue;
            }
            let mut scan_counters = counters;
            let table = match read_scan(&specimen, &grid_path, &info_path, metadata, &mut scan_counters) {
                Ok(table) => table,
                Err(e) => {
                    warn!("Skipping scan {}: {}", grid_path.display(), e);
                    stats.files_failed += 1;
                    continue;
                }
            };
            counters = scan_counters;

            let path = measurements_dir.join(format!("{}{}.txt", tables::MEASUREMENTS, file_number));
            table.write_file(&path)?;
            debug!(
                "Converted scan {} of specimen {} ({} points)",
                grid_path.display(),
                specimen,
                table.len()
            );

            file_number += 1;
            stats.files_processed += 1;
            stats.measurements_written += table.len();
            stats.output_paths.push(path);
        }
        stats.specimens_converted += 1;
    }

    let mut write = |table: MagicTable| -> Result<()> {
        let path = output_dir.join(format!("{}.txt", table.table_type));
        table.write_file(&path)?;
        stats.output_paths.push(path);
        Ok(())
    };

    let mut locations = MagicTable::new(tables::LOCATIONS);
    locations.push(metadata.location_row());
    write(locations)?;

    let mut sites = MagicTable::new(tables::SITES);
    sites.push(metadata.site_row());
    write(sites)?;

    let mut samples = MagicTable::new(tables::SAMPLES);
    samples.push(metadata.sample_row());
    write(samples)?;

    write(specimens)?;

    stats.processing_time_ms = start_time.elapsed().as_millis();
    info!(
        "Converted {} scans from {} specimens into {} measurements",
        stats.files_processed, stats.specimens_converted, stats.measurements_written
    );
    Ok(stats)
}
