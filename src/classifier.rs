//! Protocol classification.
//!
//! Assigns a lab treatment to every measurement of one specimen experiment.
//! Each transition is a pure function of the running [`ExperimentContext`]
//! and the incoming record, so individual transitions can be exercised
//! without a file.

use crate::constants::AFD_TREATMENT_THRESHOLD;
use crate::error::{MagicError, Result};
use crate::models::{ClassifiedStep, LabTreatment, NormalizedRecord, StepHint};
use crate::protocol::{Energy, Family, ProtocolEntry, ProtocolTable};

/// Position of the classifier within an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    AwaitingFirst,
    InSequence,
}

/// Field of the most recent unpaired step in a Z/I alternation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFlag {
    Cleared,
    Zero,
    In,
}

/// What the classifier remembers of an earlier step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSummary {
    pub treatment: Option<f64>,
    pub lab_treatment: LabTreatment,
}

/// Running state of one (specimen, experiment type) pair
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentContext {
    pub specimen: String,
    pub protocol: &'static ProtocolEntry,
    pub state: ClassifierState,
    pub flag: FieldFlag,
    pub steps: Vec<StepSummary>,
    /// Distinct non-zero treatment levels seen so far
    pub seen: Vec<f64>,
}

impl ExperimentContext {
    pub fn new(specimen: impl Into<String>, protocol: &'static ProtocolEntry) -> Self {
        Self {
            specimen: specimen.into(),
            protocol,
            state: ClassifierState::AwaitingFirst,
            flag: FieldFlag::Cleared,
            steps: Vec::new(),
            seen: Vec::new(),
        }
    }

    /// Context for a named experiment type
    pub fn for_experiment(specimen: &str, experiment_type: &str) -> Result<Self> {
        let protocol = ProtocolTable::lookup(experiment_type).ok_or_else(|| {
            MagicError::UnknownExperimentType {
                specimen: specimen.to_string(),
                experiment_type: experiment_type.to_string(),
            }
        })?;
        Ok(Self::new(specimen, protocol))
    }

    pub fn has_seen(&self, treatment: f64) -> bool {
        self.seen.iter().any(|level| *level == treatment)
    }

    /// Treatment of the most recent step that defines the ladder
    pub fn lookback_level(&self) -> Option<f64> {
        self.steps
            .iter()
            .rev()
            .find(|step| step.lab_treatment.is_ladder_step())
            .and_then(|step| step.treatment)
    }

    /// Highest treatment reached by a ladder step
    fn ladder_peak(&self) -> Option<f64> {
        self.steps
            .iter()
            .filter(|step| step.lab_treatment.is_ladder_step() && !step.lab_treatment.is_check())
            .filter_map(|step| step.treatment)
            .reduce(f64::max)
    }

    /// Only NRM and AF cleaning steps so far, all at or below the cleaning threshold
    fn before_main_sequence(&self) -> bool {
        self.steps.iter().all(|step| {
            matches!(
                step.lab_treatment,
                LabTreatment::NoTreatment | LabTreatment::AfDemag
            )
        }) && self.seen.iter().all(|level| *level <= AFD_TREATMENT_THRESHOLD)
    }
}

fn alteration_check(energy: Energy) -> LabTreatment {
    match energy {
        Energy::Microwave => LabTreatment::PmrmCheck,
        _ => LabTreatment::PtrmCheck,
    }
}

fn demagnetization_step(energy: Energy) -> LabTreatment {
    match energy {
        Energy::Thermal => LabTreatment::ThermalDemag,
        Energy::Microwave => LabTreatment::MicrowaveDemag,
        Energy::AlternatingField => LabTreatment::AfDemag,
    }
}

fn is_present(treatment: Option<f64>) -> Option<f64> {
    treatment.filter(|t| *t != 0.0)
}

/// Classify one record and return the updated context
pub fn classify(
    mut context: ExperimentContext,
    record: NormalizedRecord,
) -> (ClassifiedStep, ExperimentContext) {
    let protocol = context.protocol;
    let treatment = is_present(record.treatment);
    let mut warnings = Vec::new();

    let lab_treatment = if context.state == ClassifierState::AwaitingFirst {
        context.state = ClassifierState::InSequence;
        context.flag = FieldFlag::Cleared;
        first_step(&context, &record, treatment, &mut warnings)
    } else if protocol.family.is_paleointensity()
        && record.has_af_field()
        && context.before_main_sequence()
        && treatment.is_none_or(|t| t <= AFD_TREATMENT_THRESHOLD)
    {
        LabTreatment::AfDemag
    } else {
        match protocol.family {
            Family::Coe | Family::Aitken | Family::Izzi => {
                alternating_step(&mut context, &record, treatment, &mut warnings)
            }
            Family::Thellier => thellier_step(&context, &record, treatment, &mut warnings),
            Family::Perpendicular => {
                if record.has_lab_field() {
                    LabTreatment::PerpendicularInField
                } else {
                    LabTreatment::ZeroField
                }
            }
            Family::Demagnetization => demagnetization_step(protocol.energy),
        }
    };

    check_declared(protocol, lab_treatment, &mut warnings);
    check_hint(&record.hint, lab_treatment, &mut warnings);
    check_ladder(&context, treatment, lab_treatment, &mut warnings);

    if let Some(t) = treatment
        && !context.has_seen(t)
    {
        context.seen.push(t);
    }

    let sequence = context.steps.len();
    context.steps.push(StepSummary {
        treatment,
        lab_treatment,
    });

    let step = ClassifiedStep {
        record,
        treatment: lab_treatment,
        sequence,
        warnings,
    };
    (step, context)
}

fn first_step(
    context: &ExperimentContext,
    record: &NormalizedRecord,
    treatment: Option<f64>,
    warnings: &mut Vec<String>,
) -> LabTreatment {
    let protocol = context.protocol;
    if protocol.family == Family::Demagnetization {
        return match treatment {
            None => LabTreatment::NoTreatment,
            Some(_) => demagnetization_step(protocol.energy),
        };
    }

    if record.has_lab_field() {
        let field = record.lab_field.unwrap_or_default();
        if record.hint == StepHint::Nrm {
            warnings.push(format!(
                "specimen {}: NRM step recorded with a lab field of {} µT",
                context.specimen, field
            ));
        } else {
            warnings.push(format!(
                "specimen {}: first step has a lab field of {} µT; treating it as NRM",
                context.specimen, field
            ));
        }
    }
    LabTreatment::NoTreatment
}

fn alternating_step(
    context: &mut ExperimentContext,
    record: &NormalizedRecord,
    treatment: Option<f64>,
    warnings: &mut Vec<String>,
) -> LabTreatment {
    let Some(t) = treatment else {
        warnings.push(format!(
            "specimen {}: cannot relate step at line {} to the treatment ladder",
            context.specimen, record.raw.line
        ));
        return LabTreatment::NoTreatment;
    };

    let seen = context.has_seen(t);
    if record.has_lab_field() {
        if !seen {
            context.flag = FieldFlag::In;
            LabTreatment::InField
        } else if context.lookback_level().is_some_and(|level| t < level) {
            alteration_check(context.protocol.energy)
        } else {
            context.flag = FieldFlag::Cleared;
            LabTreatment::InField
        }
    } else if seen {
        if context.flag == FieldFlag::In {
            context.flag = FieldFlag::Cleared;
            LabTreatment::ZeroField
        } else {
            LabTreatment::MdCheck
        }
    } else {
        context.flag = FieldFlag::Zero;
        LabTreatment::ZeroField
    }
}

fn thellier_step(
    context: &ExperimentContext,
    record: &NormalizedRecord,
    treatment: Option<f64>,
    warnings: &mut Vec<String>,
) -> LabTreatment {
    let Some(t) = treatment else {
        warnings.push(format!(
            "specimen {}: cannot relate step at line {} to the treatment ladder",
            context.specimen, record.raw.line
        ));
        return LabTreatment::NoTreatment;
    };

    if !record.has_lab_field() {
        LabTreatment::ZeroField
    } else if context.lookback_level().is_some_and(|level| t < level) {
        alteration_check(context.protocol.energy)
    } else {
        LabTreatment::InField
    }
}

fn check_declared(protocol: &ProtocolEntry, lab_treatment: LabTreatment, warnings: &mut Vec<String>) {
    match lab_treatment {
        LabTreatment::PtrmCheck | LabTreatment::PmrmCheck if !protocol.expects_alteration_checks => {
            warnings.push(format!(
                "{} check found, but experiment type {} declares no alteration checks",
                lab_treatment, protocol.name
            ));
        }
        LabTreatment::MdCheck if !protocol.expects_md_checks => {
            warnings.push(format!(
                "{} found, but experiment type {} declares no MD checks",
                lab_treatment, protocol.name
            ));
        }
        _ => {}
    }
}

fn check_hint(hint: &StepHint, lab_treatment: LabTreatment, warnings: &mut Vec<String>) {
    let recorded = matches!(
        hint,
        StepHint::ZeroField | StepHint::InField | StepHint::AlterationCheck | StepHint::TailCheck
    );
    if !recorded {
        return;
    }
    if let Some(expected) = lab_treatment.expected_hint()
        && &expected != hint
    {
        warnings.push(format!(
            "step type {} recorded, but the step was classified as {} (expected {})",
            hint, lab_treatment, expected
        ));
    }
}

fn check_ladder(
    context: &ExperimentContext,
    treatment: Option<f64>,
    lab_treatment: LabTreatment,
    warnings: &mut Vec<String>,
) {
    if !lab_treatment.is_ladder_step() || lab_treatment.is_check() {
        return;
    }
    if let (Some(t), Some(peak)) = (treatment, context.ladder_peak())
        && t < peak
    {
        warnings.push(format!(
            "specimen {}: {} step at {} falls below the treatment already reached ({})",
            context.specimen, lab_treatment, t, peak
        ));
    }
}

/// Classify every record of one experiment, in order
pub fn classify_block(
    specimen: &str,
    protocol: &'static ProtocolEntry,
    records: Vec<NormalizedRecord>,
) -> Vec<ClassifiedStep> {
    let mut context = ExperimentContext::new(specimen, protocol);
    let mut steps = Vec::with_capacity(records.len());
    for record in records {
        let (step, next) = classify(context, record);
        context = next;
        steps.push(step);
    }
    steps
}
