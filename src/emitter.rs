//! MagIC row construction.
//!
//! Turns classified measurements and specimen headers into rows for the
//! measurements, specimens, samples and sites tables. Column names follow
//! the selected data model.

use crate::config::DataModel;
use crate::constants::{
    AZIMUTH_SENTINEL, DIP_SENTINEL, NOT_SPECIFIED, QUALITY_GOOD, ROOM_TEMPERATURE_K,
    STANDARD_UNKNOWN, tables,
};
use crate::models::{ClassifiedStep, LabTreatment, SpecimenHeader};
use crate::normalize::{
    celsius_to_kelvin, clean, format_fixed, format_sci, microtesla_to_tesla, millitesla_to_tesla,
    parse_number, parse_value,
};
use crate::protocol::{Energy, Family, ProtocolEntry};
use crate::table::Row;

/// MagIC tables written by the converters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Measurements,
    Specimens,
    Samples,
    Sites,
    Locations,
}

impl TableKind {
    /// Table type marker for the data model
    pub fn table_type(&self, model: DataModel) -> &'static str {
        match (self, model) {
            (TableKind::Measurements, DataModel::V2) => tables::MEASUREMENTS_V2,
            (TableKind::Specimens, DataModel::V2) => tables::SPECIMENS_V2,
            (TableKind::Samples, DataModel::V2) => tables::SAMPLES_V2,
            (TableKind::Sites, DataModel::V2) => tables::SITES_V2,
            (TableKind::Measurements, DataModel::V3) => tables::MEASUREMENTS,
            (TableKind::Specimens, DataModel::V3) => tables::SPECIMENS,
            (TableKind::Samples, DataModel::V3) => tables::SAMPLES,
            (TableKind::Sites, DataModel::V3) => tables::SITES,
            (TableKind::Locations, _) => tables::LOCATIONS,
        }
    }

    pub fn file_name(&self, model: DataModel) -> String {
        format!("{}.txt", self.table_type(model))
    }
}

/// Column names of one data model
#[derive(Debug)]
pub struct Columns {
    pub location: &'static str,
    pub site: &'static str,
    pub sample: &'static str,
    pub specimen: &'static str,
    pub citations: &'static str,
    pub analysts: &'static str,
    pub instrument_codes: &'static str,
    pub quality: &'static str,
    pub standard: &'static str,
    pub step_number: &'static str,
    pub experiment: &'static str,
    pub method_codes: &'static str,
    pub dec: &'static str,
    pub inc: &'static str,
    pub moment: &'static str,
    pub meas_temp: &'static str,
    pub dc_field: &'static str,
    pub dc_field_phi: &'static str,
    pub dc_field_theta: &'static str,
    pub mw_power: &'static str,
    pub mw_time: &'static str,
    pub mw_integral: &'static str,
    pub meas_description: &'static str,
    pub treat_temp: &'static str,
    pub ac_field: &'static str,
    pub timestamp: &'static str,
    pub geologic_types: &'static str,
    pub lithologies: &'static str,
    pub geologic_classes: &'static str,
    pub dip: &'static str,
    pub azimuth: &'static str,
    pub height: &'static str,
    pub spec_description: &'static str,
    pub volume: &'static str,
    pub density: &'static str,
    pub lat: &'static str,
    pub lon: &'static str,
}

static V2_COLUMNS: Columns = Columns {
    location: "er_location_name",
    site: "er_site_name",
    sample: "er_sample_name",
    specimen: "er_specimen_name",
    citations: "er_citation_names",
    analysts: "er_analyst_mail_names",
    instrument_codes: "magic_instrument_codes",
    quality: "measurement_flag",
    standard: "measurement_standard",
    step_number: "measurement_number",
    experiment: "magic_experiment_name",
    method_codes: "magic_method_codes",
    dec: "measurement_dec",
    inc: "measurement_inc",
    moment: "measurement_magn_moment",
    meas_temp: "measurement_temp",
    dc_field: "treatment_dc_field",
    dc_field_phi: "treatment_dc_field_phi",
    dc_field_theta: "treatment_dc_field_theta",
    mw_power: "treatment_mw_power",
    mw_time: "treatment_mw_time",
    mw_integral: "treatment_mw_integral",
    meas_description: "measurement_description",
    treat_temp: "treatment_temp",
    ac_field: "treatment_ac_field",
    timestamp: "measurement_date",
    geologic_types: "specimen_type",
    lithologies: "specimen_lithology",
    geologic_classes: "specimen_class",
    dip: "specimen_dip",
    azimuth: "specimen_azimuth",
    height: "specimen_height",
    spec_description: "specimen_description",
    volume: "specimen_volume",
    density: "specimen_density",
    lat: "site_lat",
    lon: "site_lon",
};

static V3_COLUMNS: Columns = Columns {
    location: "location",
    site: "site",
    sample: "sample",
    specimen: "specimen",
    citations: "citations",
    analysts: "analysts",
    instrument_codes: "instrument_codes",
    quality: "quality",
    standard: "standard",
    step_number: "treat_step_num",
    experiment: "experiment",
    method_codes: "method_codes",
    dec: "dir_dec",
    inc: "dir_inc",
    moment: "magn_moment",
    meas_temp: "meas_temp",
    dc_field: "treat_dc_field",
    dc_field_phi: "treat_dc_field_phi",
    dc_field_theta: "treat_dc_field_theta",
    mw_power: "treat_mw_power",
    mw_time: "treat_mw_time",
    mw_integral: "treat_mw_integral",
    meas_description: "description",
    treat_temp: "treat_temp",
    ac_field: "treat_ac_field",
    timestamp: "timestamp",
    geologic_types: "geologic_types",
    lithologies: "lithologies",
    geologic_classes: "geologic_classes",
    dip: "dip",
    azimuth: "azimuth",
    height: "height",
    spec_description: "description",
    volume: "volume",
    density: "density",
    lat: "lat",
    lon: "lon",
};

pub fn columns(model: DataModel) -> &'static Columns {
    match model {
        DataModel::V2 => &V2_COLUMNS,
        DataModel::V3 => &V3_COLUMNS,
    }
}

/// Names of a specimen and its parents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecimenNames {
    pub specimen: String,
    pub sample: String,
    pub site: String,
    pub location: String,
    pub citation: String,
}

fn identity_fields(row: &mut Row, columns: &Columns, names: &SpecimenNames) {
    row.set(columns.citations, names.citation.as_str());
    row.set(columns.specimen, names.specimen.as_str());
    row.set(columns.sample, names.sample.as_str());
    row.set(columns.site, names.site.as_str());
    row.set(columns.location, names.location.as_str());
}

fn optional(value: Option<f64>, format: impl Fn(f64) -> String) -> String {
    value.map(format).unwrap_or_default()
}

/// One measurements table row
pub fn measurement_row(
    model: DataModel,
    names: &SpecimenNames,
    header: &SpecimenHeader,
    protocol: &ProtocolEntry,
    step: &ClassifiedStep,
) -> Row {
    let columns = columns(model);
    let record = &step.record;
    let mut row = Row::new();

    identity_fields(&mut row, columns, names);
    row.set(columns.analysts, header.measurer.as_str());
    row.set(
        columns.instrument_codes,
        format!("{}:{}", header.magnetometer, header.demagnetiser),
    );
    row.set(columns.quality, QUALITY_GOOD);
    row.set(columns.standard, STANDARD_UNKNOWN);
    row.set(columns.step_number, step.sequence.to_string());

    let moment = record.moment;
    row.set(columns.dec, optional(moment.map(|m| m.declination), |v| format_fixed(v, 2)));
    row.set(columns.inc, optional(moment.map(|m| m.inclination), |v| format_fixed(v, 2)));
    row.set(columns.moment, optional(moment.map(|m| m.magnitude), |v| format_sci(v, 3)));
    row.set(columns.meas_temp, ROOM_TEMPERATURE_K);
    row.set(columns.timestamp, record.timestamp.clone().unwrap_or_default());

    if protocol.family == Family::Demagnetization {
        row.set(columns.dc_field, "0");
        row.set(columns.dc_field_phi, "0");
        row.set(columns.dc_field_theta, "0");
    } else {
        row.set(
            columns.dc_field,
            optional(record.lab_field, |f| format_sci(microtesla_to_tesla(f), 3)),
        );
        row.set(columns.dc_field_phi, optional(record.lab_field_dec, clean));
        row.set(columns.dc_field_theta, optional(record.lab_field_inc, clean));
    }

    match protocol.energy {
        Energy::Microwave => {
            row.set(columns.mw_power, record.raw.microwave_power.as_str());
            row.set(columns.mw_time, record.raw.microwave_time.as_str());
            row.set(columns.mw_integral, record.raw.microwave_integral.as_str());
            let step_number = parse_number(&record.raw.step_number)
                .map(|n| format!("{}", n.trunc() as i64))
                .unwrap_or_else(|| record.raw.step_number.clone());
            row.set(
                columns.meas_description,
                format!("Step Type-{}:Step Number-{}", record.raw.step_type, step_number),
            );
        }
        Energy::Thermal => {
            row.set(
                columns.treat_temp,
                optional(record.th_peak, |t| format_fixed(celsius_to_kelvin(t), 2)),
            );
        }
        Energy::AlternatingField => {}
    }

    if protocol.energy == Energy::AlternatingField || step.treatment == LabTreatment::AfDemag {
        row.set(
            columns.ac_field,
            optional(record.af_peak, |f| format_sci(millitesla_to_tesla(f), 3)),
        );
    }

    let method_codes = format!("{}:{}", step.treatment.code(protocol.energy), protocol.method_codes);
    row.set(columns.method_codes, method_codes.trim_matches(':'));

    let experiment = format!("{}:{}", names.specimen, protocol.method_codes);
    if model == DataModel::V3 {
        row.set("measurement", format!("{}_{}", experiment, step.sequence));
    }
    row.set(columns.experiment, experiment);
    row
}

fn without_sentinel(raw: &str, sentinel: f64) -> String {
    match parse_number(raw) {
        Some(value) if value == sentinel => String::new(),
        _ => raw.trim().to_string(),
    }
}

/// One specimens table row built from a block header
pub fn specimen_row(model: DataModel, names: &SpecimenNames, header: &SpecimenHeader) -> Row {
    let columns = columns(model);
    let mut row = Row::new();

    identity_fields(&mut row, columns, names);
    row.set(columns.geologic_types, NOT_SPECIFIED);
    row.set(columns.lithologies, NOT_SPECIFIED);
    row.set(columns.geologic_classes, NOT_SPECIFIED);
    row.set(columns.dip, without_sentinel(&header.sample_dip, DIP_SENTINEL));
    row.set(columns.azimuth, without_sentinel(&header.sample_dec, AZIMUTH_SENTINEL));
    row.set(columns.height, header.height.as_str());
    row.set(columns.spec_description, header.comment.as_str());
    // cc to m³
    row.set(
        columns.volume,
        optional(parse_value(&header.sample_volume), |v| clean(v / 1e6)),
    );
    row.set(columns.density, header.sample_density.as_str());
    row
}

/// One samples table row
pub fn sample_row(model: DataModel, names: &SpecimenNames) -> Row {
    let columns = columns(model);
    Row::new()
        .with(columns.sample, names.sample.as_str())
        .with(columns.site, names.site.as_str())
        .with(columns.location, names.location.as_str())
        .with(columns.citations, names.citation.as_str())
}

/// One sites table row, with coordinates from the block header.
///
/// Coordinates are taken as written; -99 and 999 are real longitudes here.
pub fn site_row(model: DataModel, names: &SpecimenNames, header: &SpecimenHeader) -> Row {
    let columns = columns(model);
    Row::new()
        .with(columns.site, names.site.as_str())
        .with(columns.location, names.location.as_str())
        .with(columns.lat, optional(parse_number(&header.site_latitude), clean))
        .with(columns.lon, optional(parse_number(&header.site_longitude), clean))
        .with(columns.citations, names.citation.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Moment, NormalizedRecord, RawRecord, StepHint};
    use crate::protocol::ProtocolTable;

    fn names() -> SpecimenNames {
        SpecimenNames {
            specimen: "s1a".to_string(),
            sample: "s1".to_string(),
            site: "s".to_string(),
            location: "Timna".to_string(),
            citation: "This study".to_string(),
        }
    }

    fn header() -> SpecimenHeader {
        SpecimenHeader {
            sample_code: "s1a".to_string(),
            sample_dip: "99".to_string(),
            sample_dec: "120".to_string(),
            site_latitude: "29.8".to_string(),
            site_longitude: "34.9".to_string(),
            measurer: "rs".to_string(),
            magnetometer: "2G".to_string(),
            demagnetiser: "ASC".to_string(),
            sample_volume: "10".to_string(),
            ..Default::default()
        }
    }

    fn step(treatment: LabTreatment, sequence: usize) -> ClassifiedStep {
        ClassifiedStep {
            record: NormalizedRecord {
                raw: RawRecord {
                    step_number: "3".to_string(),
                    step_type: "I".to_string(),
                    microwave_power: "20".to_string(),
                    ..Default::default()
                },
                treatment: Some(200.0),
                lab_field: Some(40.0),
                lab_field_dec: Some(0.0),
                lab_field_inc: Some(90.0),
                af_peak: Some(10.0),
                th_peak: Some(200.0),
                moment: Some(Moment {
                    magnitude: 1.2346e-8,
                    declination: 12.346,
                    inclination: -45.0,
                }),
                timestamp: Some("2013:11:05:14:00:00".to_string()),
                hint: StepHint::InField,
            },
            treatment,
            sequence,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_thermal_measurement_row() {
        let protocol = ProtocolTable::lookup("TH-PI-IZZI+").unwrap();
        let row = measurement_row(
            DataModel::V3,
            &names(),
            &header(),
            protocol,
            &step(LabTreatment::InField, 4),
        );

        assert_eq!(row.get("specimen"), Some("s1a"));
        assert_eq!(row.get("instrument_codes"), Some("2G:ASC"));
        assert_eq!(row.get("treat_step_num"), Some("4"));
        assert_eq!(row.get("dir_dec"), Some("12.35"));
        assert_eq!(row.get("dir_inc"), Some("-45.00"));
        assert_eq!(row.get("magn_moment"), Some("1.235e-08"));
        assert_eq!(row.get("treat_dc_field"), Some("4.000e-05"));
        assert_eq!(row.get("treat_dc_field_theta"), Some("90"));
        assert_eq!(row.get("treat_temp"), Some("473.00"));
        assert_eq!(row.get("treat_ac_field"), None);
        assert_eq!(
            row.get("method_codes"),
            Some("LT-T-I:LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM")
        );
        assert_eq!(
            row.get("experiment"),
            Some("s1a:LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM")
        );
        assert_eq!(
            row.get("measurement"),
            Some("s1a:LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM_4")
        );
    }

    #[test]
    fn test_af_demag_step_in_paleointensity_row() {
        let protocol = ProtocolTable::lookup("TH-PI-IZZI").unwrap();
        let row = measurement_row(
            DataModel::V3,
            &names(),
            &header(),
            protocol,
            &step(LabTreatment::AfDemag, 1),
        );
        assert_eq!(row.get("treat_ac_field"), Some("1.000e-02"));
        assert!(row.get("method_codes").unwrap().starts_with("LT-AF-Z:"));
    }

    #[test]
    fn test_microwave_and_demag_rows() {
        let protocol = ProtocolTable::lookup("MW-PI-C++").unwrap();
        let row = measurement_row(
            DataModel::V3,
            &names(),
            &header(),
            protocol,
            &step(LabTreatment::InField, 2),
        );
        assert_eq!(row.get("treat_mw_power"), Some("20"));
        assert_eq!(row.get("description"), Some("Step Type-I:Step Number-3"));
        assert_eq!(row.get("treat_temp"), None);

        let protocol = ProtocolTable::lookup("TH-D").unwrap();
        let row = measurement_row(
            DataModel::V3,
            &names(),
            &header(),
            protocol,
            &step(LabTreatment::ThermalDemag, 2),
        );
        assert_eq!(row.get("treat_dc_field"), Some("0"));
        assert_eq!(row.get("method_codes"), Some("LT-T-Z:LP-DIR-T"));
    }

    #[test]
    fn test_absent_lab_field_is_empty() {
        let protocol = ProtocolTable::lookup("TH-PI-C").unwrap();
        let mut step = step(LabTreatment::ZeroField, 1);
        step.record.lab_field = None;
        let row = measurement_row(DataModel::V3, &names(), &header(), protocol, &step);
        assert_eq!(row.get("treat_dc_field"), Some(""));
    }

    #[test]
    fn test_data_model_2_columns() {
        let protocol = ProtocolTable::lookup("TH-PI-C").unwrap();
        let row = measurement_row(
            DataModel::V2,
            &names(),
            &header(),
            protocol,
            &step(LabTreatment::ZeroField, 0),
        );
        assert_eq!(row.get("er_specimen_name"), Some("s1a"));
        assert_eq!(row.get("magic_method_codes"), Some("LT-T-Z:LP-PI-TRM:LP-PI-ZI:LP-PI-TRM-ZI"));
        assert_eq!(row.get("measurement"), None);
        assert_eq!(TableKind::Measurements.file_name(DataModel::V2), "magic_measurements.txt");
        assert_eq!(TableKind::Specimens.table_type(DataModel::V3), "specimens");
    }

    #[test]
    fn test_specimen_row_sentinels_and_volume() {
        let row = specimen_row(DataModel::V3, &names(), &header());
        assert_eq!(row.get("dip"), Some(""));
        assert_eq!(row.get("azimuth"), Some("120"));
        assert_eq!(row.get("volume"), Some("1e-05"));
        assert_eq!(row.get("geologic_types"), Some("Not Specified"));
    }

    #[test]
    fn test_sample_and_site_rows() {
        let sample = sample_row(DataModel::V3, &names());
        assert_eq!(sample.get("sample"), Some("s1"));
        assert_eq!(sample.get("site"), Some("s"));

        let site = site_row(DataModel::V2, &names(), &header());
        assert_eq!(site.get("er_site_name"), Some("s"));
        assert_eq!(site.get("site_lat"), Some("29.8"));
        assert_eq!(site.get("site_lon"), Some("34.9"));
    }

    #[test]
    fn test_site_coordinates_keep_sentinel_values() {
        let mut header = header();
        header.site_latitude = "19.4".to_string();
        header.site_longitude = "-99".to_string();
        let site = site_row(DataModel::V3, &names(), &header);
        assert_eq!(site.get("lat"), Some("19.4"));
        assert_eq!(site.get("lon"), Some("-99"));

        header.site_longitude = String::new();
        let site = site_row(DataModel::V3, &names(), &header);
        assert_eq!(site.get("lon"), Some(""));
    }
}
