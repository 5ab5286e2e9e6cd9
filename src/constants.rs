//! Application constants for the MagIC converters
//!
//! Sentinels, file-format field counts, unit factors and MagIC vocabulary
//! strings used throughout the converters.

// =============================================================================
// Livdb File Layout
// =============================================================================

/// Number of comma-separated fields in a Livdb specimen header line
pub const LIVDB_HEADER_FIELDS: usize = 19;

/// Minimum header fields needed to identify the specimen and experiment type
pub const LIVDB_MIN_HEADER_FIELDS: usize = 11;

/// Number of comma-separated fields in a Livdb measurement line
pub const LIVDB_BODY_FIELDS: usize = 22;

/// Marker closing a specimen block
pub const LIVDB_END_MARKER: &str = "END";

/// File suffixes recognised as Livdb input
pub const LIVDB_EXTENSIONS: &[&str] = &[".livdb", ".livdb.csv", ".csv"];

/// Livdb header field names, in file order
pub const LIVDB_HEADER_CODES: [&str; LIVDB_HEADER_FIELDS] = [
    "Sample code",
    "Sample Dip",
    "Sample Dec",
    "Height",
    "Position",
    "Thickness",
    "Unit Dip",
    "Unit Dip Direction",
    "Site Latitude",
    "Site Longitude",
    "Experiment Type",
    "Name of measurer",
    "Magnetometer name",
    "Demagnetiser name",
    "Specimen/Experiment Comment",
    "Database version",
    "Conversion Version",
    "Sample Volume",
    "Sample Density",
];

/// Livdb measurement field names, in file order
pub const LIVDB_BODY_CODES: [&str; LIVDB_BODY_FIELDS] = [
    "Treatment (aka field)",
    "Microwave Power",
    "Microwave Time",
    "moment_X",
    "moment_Y",
    "moment_Z",
    "Mass",
    "Applied field Intensity",
    "Applied field Dec",
    "Applied field Inc",
    "Measurement Date",
    "Measurement Time",
    "Measurement Remark",
    "Step Number",
    "Step Type",
    "Tristan Gain",
    "Microwave Power Integral",
    "JR6 Error",
    "FiT Smm",
    "Utrecht Error",
    "AF Demag/Remag Peak Field",
    "TH Demag/Remag Peak Temperature",
];

// =============================================================================
// Sentinels and Thresholds
// =============================================================================

/// Values used by instruments to mean "not applicable"
pub const NOT_APPLICABLE_SENTINELS: &[f64] = &[999.0, -99.0];

/// Sample dip sentinel in Livdb headers
pub const DIP_SENTINEL: f64 = 99.0;

/// Sample azimuth sentinel in Livdb headers
pub const AZIMUTH_SENTINEL: f64 = 999.0;

/// Treatments at or below this level are still "before the experiment"
/// when detecting pre-experiment AF cleaning
pub const AFD_TREATMENT_THRESHOLD: f64 = 50.0;

/// Measurement temperature written for room-temperature measurements (K)
pub const ROOM_TEMPERATURE_K: &str = "273";

// =============================================================================
// MagIC Vocabulary
// =============================================================================

/// Table type markers
pub mod tables {
    pub const MEASUREMENTS: &str = "measurements";
    pub const SPECIMENS: &str = "specimens";
    pub const SAMPLES: &str = "samples";
    pub const SITES: &str = "sites";
    pub const LOCATIONS: &str = "locations";

    pub const MEASUREMENTS_V2: &str = "magic_measurements";
    pub const SPECIMENS_V2: &str = "er_specimens";
    pub const SAMPLES_V2: &str = "er_samples";
    pub const SITES_V2: &str = "er_sites";
}

/// Default citation for newly converted data
pub const DEFAULT_CITATION: &str = "This study";

/// Placeholder for unknown geologic descriptions
pub const NOT_SPECIFIED: &str = "Not Specified";

/// Measurement quality flag for good data
pub const QUALITY_GOOD: &str = "g";

/// Measurement standard flag for unknowns
pub const STANDARD_UNKNOWN: &str = "u";

/// Lab protocol code always attached to SQUID microscope measurements
pub const SQUID_METHOD_CODE: &str = "LP-SQUIDM";

// =============================================================================
// Processing Defaults
// =============================================================================

/// Default output directory for converted tables
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// Default starting measurement sequence number for SQUID scans
pub const DEFAULT_SQUID_SEQUENCE: u64 = 1;

/// Environment filter target for this crate's logs
pub const LOG_TARGET: &str = "magic_converter";
