//! Core data structures and types for MagIC conversion.
//!
//! Defines raw instrument records, normalized records, lab treatment
//! codes, classified steps and processing statistics.

use crate::protocol::Energy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Header of one Livdb specimen/experiment block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecimenHeader {
    pub sample_code: String,
    pub sample_dip: String,
    pub sample_dec: String,
    pub height: String,
    pub position: String,
    pub thickness: String,
    pub unit_dip: String,
    pub unit_dip_direction: String,
    pub site_latitude: String,
    pub site_longitude: String,
    pub experiment_type: String,
    pub measurer: String,
    pub magnetometer: String,
    pub demagnetiser: String,
    pub comment: String,
    pub database_version: String,
    pub conversion_version: String,
    pub sample_volume: String,
    pub sample_density: String,
}

/// One measurement line as read from the instrument file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub specimen: String,
    pub treatment: String,
    pub microwave_power: String,
    pub microwave_time: String,
    pub moment_x: String,
    pub moment_y: String,
    pub moment_z: String,
    pub mass: String,
    pub field_intensity: String,
    pub field_dec: String,
    pub field_inc: String,
    pub date: String,
    pub time: String,
    pub remark: String,
    pub step_number: String,
    pub step_type: String,
    pub tristan_gain: String,
    pub microwave_integral: String,
    pub jr6_error: String,
    pub fit_smm: String,
    pub utrecht_error: String,
    pub af_peak_field: String,
    pub th_peak_temperature: String,
    /// 1-based line number in the source file
    pub line: usize,
}

impl RawRecord {
    /// Fields that decide how a record is classified
    pub fn repeat_key(&self) -> [&str; 9] {
        [
            self.treatment.as_str(),
            self.microwave_power.as_str(),
            self.microwave_time.as_str(),
            self.af_peak_field.as_str(),
            self.field_intensity.as_str(),
            self.field_dec.as_str(),
            self.field_inc.as_str(),
            self.step_type.as_str(),
            self.th_peak_temperature.as_str(),
        ]
    }
}

/// One specimen/experiment block: header plus ordered records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecimenBlock {
    pub header: SpecimenHeader,
    pub records: Vec<RawRecord>,
    /// Line number of the block header
    pub line: usize,
}

impl SpecimenBlock {
    pub fn specimen(&self) -> &str {
        &self.header.sample_code
    }

    pub fn experiment_type(&self) -> &str {
        &self.header.experiment_type
    }
}

/// Vendor-supplied step type hint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepHint {
    /// Hint field left empty
    #[default]
    Missing,
    Nrm,
    ZeroField,
    InField,
    AlterationCheck,
    TailCheck,
    Other(String),
}

impl StepHint {
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().trim_matches('"');
        match value {
            "" => StepHint::Missing,
            "Z" => StepHint::ZeroField,
            "I" => StepHint::InField,
            "P" => StepHint::AlterationCheck,
            "T" => StepHint::TailCheck,
            v if v.contains("NRM") => StepHint::Nrm,
            v => StepHint::Other(v.to_string()),
        }
    }
}

impl fmt::Display for StepHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepHint::Missing => write!(f, "(none)"),
            StepHint::Nrm => write!(f, "NRM"),
            StepHint::ZeroField => write!(f, "Z"),
            StepHint::InField => write!(f, "I"),
            StepHint::AlterationCheck => write!(f, "P"),
            StepHint::TailCheck => write!(f, "T"),
            StepHint::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Remanence vector in SI units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    /// Magnitude in Am²
    pub magnitude: f64,
    pub declination: f64,
    pub inclination: f64,
}

/// A raw record with typed, unit-normalized values
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub raw: RawRecord,
    /// Treatment level in the protocol's native unit (°C, step number or mT)
    pub treatment: Option<f64>,
    /// Applied lab field in µT; `None` when not recorded
    pub lab_field: Option<f64>,
    pub lab_field_dec: Option<f64>,
    pub lab_field_inc: Option<f64>,
    /// AF peak field in mT
    pub af_peak: Option<f64>,
    /// Thermal peak temperature in °C
    pub th_peak: Option<f64>,
    pub moment: Option<Moment>,
    /// `YYYY:MM:DD:HH:MM:SS`
    pub timestamp: Option<String>,
    pub hint: StepHint,
}

impl NormalizedRecord {
    /// Lab field is present and non-zero
    pub fn has_lab_field(&self) -> bool {
        self.lab_field.is_some_and(|f| f != 0.0)
    }

    /// AF peak field is present and non-zero
    pub fn has_af_field(&self) -> bool {
        self.af_peak.is_some_and(|f| f != 0.0)
    }
}

/// Lab treatment assigned to a measurement step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabTreatment {
    NoTreatment,
    ZeroField,
    InField,
    PtrmCheck,
    PmrmCheck,
    MdCheck,
    AfDemag,
    ThermalDemag,
    MicrowaveDemag,
    PerpendicularInField,
}

impl LabTreatment {
    /// MagIC method code(s) for this treatment under the given energy
    pub fn code(&self, energy: Energy) -> &'static str {
        let microwave = energy == Energy::Microwave;
        match self {
            LabTreatment::NoTreatment => "LT-NO",
            LabTreatment::ZeroField if microwave => "LT-M-Z",
            LabTreatment::ZeroField => "LT-T-Z",
            LabTreatment::InField if microwave => "LT-M-I",
            LabTreatment::InField => "LT-T-I",
            LabTreatment::PtrmCheck => "LT-PTRM-I",
            LabTreatment::PmrmCheck => "LT-PMRM-I",
            LabTreatment::MdCheck if microwave => "LT-PMRM-MD",
            LabTreatment::MdCheck => "LT-PTRM-MD",
            LabTreatment::AfDemag => "LT-AF-Z",
            LabTreatment::ThermalDemag => "LT-T-Z",
            LabTreatment::MicrowaveDemag => "LT-M-Z",
            LabTreatment::PerpendicularInField if microwave => "LT-M-I:LT-NRM-PERP",
            LabTreatment::PerpendicularInField => "LT-T-I:LT-NRM-PERP",
        }
    }

    /// Checks do not advance the treatment ladder
    pub fn is_check(&self) -> bool {
        matches!(
            self,
            LabTreatment::PtrmCheck | LabTreatment::PmrmCheck | LabTreatment::MdCheck
        )
    }

    /// Steps that define the current treatment level
    pub fn is_ladder_step(&self) -> bool {
        !matches!(
            self,
            LabTreatment::NoTreatment
                | LabTreatment::AfDemag
                | LabTreatment::PtrmCheck
                | LabTreatment::PmrmCheck
        )
    }

    /// Step type hint an instrument should have recorded for this step
    pub fn expected_hint(&self) -> Option<StepHint> {
        match self {
            LabTreatment::InField => Some(StepHint::InField),
            LabTreatment::ZeroField => Some(StepHint::ZeroField),
            LabTreatment::PtrmCheck | LabTreatment::PmrmCheck => Some(StepHint::AlterationCheck),
            LabTreatment::MdCheck => Some(StepHint::TailCheck),
            _ => None,
        }
    }

    /// Recover the lab treatment from an emitted `method_codes` value.
    ///
    /// Zero-field codes are ambiguous between demagnetization and
    /// paleointensity steps, so the protocol energy and family decide.
    pub fn from_method_codes(method_codes: &str, demagnetization: bool) -> Option<Self> {
        let codes: Vec<&str> = method_codes.split(':').map(str::trim).collect();
        let has = |code: &str| codes.contains(&code);

        if has("LT-NRM-PERP") {
            return Some(LabTreatment::PerpendicularInField);
        }
        let treatment = if has("LT-NO") {
            LabTreatment::NoTreatment
        } else if has("LT-AF-Z") {
            LabTreatment::AfDemag
        } else if has("LT-PTRM-I") {
            LabTreatment::PtrmCheck
        } else if has("LT-PMRM-I") {
            LabTreatment::PmrmCheck
        } else if has("LT-PTRM-MD") || has("LT-PMRM-MD") {
            LabTreatment::MdCheck
        } else if has("LT-T-I") || has("LT-M-I") {
            LabTreatment::InField
        } else if has("LT-T-Z") && demagnetization {
            LabTreatment::ThermalDemag
        } else if has("LT-M-Z") && demagnetization {
            LabTreatment::MicrowaveDemag
        } else if has("LT-T-Z") || has("LT-M-Z") {
            LabTreatment::ZeroField
        } else {
            return None;
        };
        Some(treatment)
    }
}

impl fmt::Display for LabTreatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabTreatment::NoTreatment => "no-treatment",
            LabTreatment::ZeroField => "zero-field",
            LabTreatment::InField => "in-field",
            LabTreatment::PtrmCheck => "pTRM-check",
            LabTreatment::PmrmCheck => "pMRM-check",
            LabTreatment::MdCheck => "MD-check",
            LabTreatment::AfDemag => "AF-demag",
            LabTreatment::ThermalDemag => "thermal-demag",
            LabTreatment::MicrowaveDemag => "microwave-demag",
            LabTreatment::PerpendicularInField => "perpendicular-in-field",
        };
        write!(f, "{}", name)
    }
}

/// A normalized record with its inferred lab treatment
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedStep {
    pub record: NormalizedRecord,
    pub treatment: LabTreatment,
    /// Running step number within the experiment, starting at 0
    pub sequence: usize,
    pub warnings: Vec<String>,
}

/// Processing statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub specimens_converted: usize,
    pub specimens_skipped: usize,
    pub measurements_written: usize,
    pub repeats_collapsed: usize,
    pub warnings: usize,
    pub output_paths: Vec<PathBuf>,
    pub processing_time_ms: u128,
}

impl ProcessingStats {
    /// Fold another file's statistics into this one
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.files_processed += other.files_processed;
        self.files_failed += other.files_failed;
        self.specimens_converted += other.specimens_converted;
        self.specimens_skipped += other.specimens_skipped;
        self.measurements_written += other.measurements_written;
        self.repeats_collapsed += other.repeats_collapsed;
        self.warnings += other.warnings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_hint_parse() {
        assert_eq!(StepHint::parse("Z"), StepHint::ZeroField);
        assert_eq!(StepHint::parse(" I "), StepHint::InField);
        assert_eq!(StepHint::parse("\"P\""), StepHint::AlterationCheck);
        assert_eq!(StepHint::parse("NRM"), StepHint::Nrm);
        assert_eq!(StepHint::parse(""), StepHint::Missing);
        assert_eq!(StepHint::parse("O"), StepHint::Other("O".to_string()));
    }

    #[test]
    fn test_treatment_codes_follow_energy() {
        assert_eq!(LabTreatment::InField.code(Energy::Thermal), "LT-T-I");
        assert_eq!(LabTreatment::InField.code(Energy::Microwave), "LT-M-I");
        assert_eq!(LabTreatment::MdCheck.code(Energy::Microwave), "LT-PMRM-MD");
        assert_eq!(
            LabTreatment::PerpendicularInField.code(Energy::Microwave),
            "LT-M-I:LT-NRM-PERP"
        );
        assert_eq!(LabTreatment::AfDemag.code(Energy::Thermal), "LT-AF-Z");
    }

    #[test]
    fn test_from_method_codes() {
        assert_eq!(
            LabTreatment::from_method_codes("LT-PTRM-I:LP-PI-TRM:LP-PI-BT-IZZI", false),
            Some(LabTreatment::PtrmCheck)
        );
        assert_eq!(
            LabTreatment::from_method_codes("LT-T-Z:LP-DIR-T", true),
            Some(LabTreatment::ThermalDemag)
        );
        assert_eq!(
            LabTreatment::from_method_codes("LT-T-Z:LP-PI-TRM", false),
            Some(LabTreatment::ZeroField)
        );
        assert_eq!(
            LabTreatment::from_method_codes("LT-M-I:LT-NRM-PERP:LP-PI-M", false),
            Some(LabTreatment::PerpendicularInField)
        );
        assert_eq!(LabTreatment::from_method_codes("LP-PI-TRM", false), None);
    }

    #[test]
    fn test_repeat_key_ignores_moment() {
        let a = RawRecord {
            treatment: "100".to_string(),
            moment_x: "1.0".to_string(),
            ..Default::default()
        };
        let b = RawRecord {
            treatment: "100".to_string(),
            moment_x: "2.0".to_string(),
            ..Default::default()
        };
        assert_eq!(a.repeat_key(), b.repeat_key());
    }
}
