//! Closed set of section kinds the engine can bind a renderer to.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Icon used when a kind has no dedicated icon.
pub const DEFAULT_SECTION_ICON: &str = "fas fa-file-alt";

/// Editable section type, one renderer per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Subjective,
    Vitals,
    Pain,
    Medication,
    LivingArrangements,
    GaitMobilityTraining,
    MuscleStrengthRom,
    Balance,
    TransfersFunctionalIndependence,
    AdlSelfCare,
    AssessmentJustification,
    CognitiveStatus,
    Sensory,
    Equipment,
    ProstheticOrthotic,
    PatientCaregiverEducation,
    SkilledCareProvidedThisVisit,
    ProblemListFunctionalLimitations,
    RehabPotential,
    TreatmentAsToleratedBasicPoc,
    ShortLongTermGoals,
    StandardizedTests,
    TreatmentInterventions,
    Signature,
}

/// Accepted section names: descriptive labels and short component names.
const SECTION_NAME_TABLE: &[(&str, SectionKind)] = &[
    ("Subjective", SectionKind::Subjective),
    ("Initial Evaluation", SectionKind::Subjective),
    ("Vitals", SectionKind::Vitals),
    ("Pain", SectionKind::Pain),
    ("Medication", SectionKind::Medication),
    ("Living Arrangements", SectionKind::LivingArrangements),
    ("LivingArrangements", SectionKind::LivingArrangements),
    ("Gait / Mobility Training (Eval)", SectionKind::GaitMobilityTraining),
    ("GaitMobility", SectionKind::GaitMobilityTraining),
    ("Muscle Strength/ROM", SectionKind::MuscleStrengthRom),
    ("MuscleStrengthSection", SectionKind::MuscleStrengthRom),
    ("Balance", SectionKind::Balance),
    ("BalanceSection", SectionKind::Balance),
    (
        "Transfers / Functional Independence",
        SectionKind::TransfersFunctionalIndependence,
    ),
    (
        "TransfersFunctionalIndependence",
        SectionKind::TransfersFunctionalIndependence,
    ),
    ("ADL / Self Care Skills", SectionKind::AdlSelfCare),
    ("ADLSelfCare", SectionKind::AdlSelfCare),
    ("Assessment / Justification", SectionKind::AssessmentJustification),
    ("AssessmentJustificationSection", SectionKind::AssessmentJustification),
    ("Cognitive Status / Comprehension", SectionKind::CognitiveStatus),
    ("Sensory", SectionKind::Sensory),
    ("Equipment", SectionKind::Equipment),
    ("Prosthetic And Orthotic", SectionKind::ProstheticOrthotic),
    ("Patient / Caregiver Education", SectionKind::PatientCaregiverEducation),
    (
        "Skilled Care Provided This Visit",
        SectionKind::SkilledCareProvidedThisVisit,
    ),
    ("SkilledCareSection", SectionKind::SkilledCareProvidedThisVisit),
    (
        "Problem List / Functional Limitations",
        SectionKind::ProblemListFunctionalLimitations,
    ),
    ("ProblemListSection", SectionKind::ProblemListFunctionalLimitations),
    ("Rehab Potential", SectionKind::RehabPotential),
    ("RehabPotentialSection", SectionKind::RehabPotential),
    (
        "Treatment as Tolerated/Basic POC",
        SectionKind::TreatmentAsToleratedBasicPoc,
    ),
    ("Short & Long Term Goals", SectionKind::ShortLongTermGoals),
    ("Goals", SectionKind::ShortLongTermGoals),
    ("StandardizedTests", SectionKind::StandardizedTests),
    ("TreatmentInterventions", SectionKind::TreatmentInterventions),
    ("Signature", SectionKind::Signature),
];

impl SectionKind {
    pub const ALL: [SectionKind; 24] = [
        Self::Subjective,
        Self::Vitals,
        Self::Pain,
        Self::Medication,
        Self::LivingArrangements,
        Self::GaitMobilityTraining,
        Self::MuscleStrengthRom,
        Self::Balance,
        Self::TransfersFunctionalIndependence,
        Self::AdlSelfCare,
        Self::AssessmentJustification,
        Self::CognitiveStatus,
        Self::Sensory,
        Self::Equipment,
        Self::ProstheticOrthotic,
        Self::PatientCaregiverEducation,
        Self::SkilledCareProvidedThisVisit,
        Self::ProblemListFunctionalLimitations,
        Self::RehabPotential,
        Self::TreatmentAsToleratedBasicPoc,
        Self::ShortLongTermGoals,
        Self::StandardizedTests,
        Self::TreatmentInterventions,
        Self::Signature,
    ];

    /// Stable identifier used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subjective => "subjective",
            Self::Vitals => "vitals",
            Self::Pain => "pain",
            Self::Medication => "medication",
            Self::LivingArrangements => "living_arrangements",
            Self::GaitMobilityTraining => "gait_mobility_training",
            Self::MuscleStrengthRom => "muscle_strength_rom",
            Self::Balance => "balance",
            Self::TransfersFunctionalIndependence => "transfers_functional_independence",
            Self::AdlSelfCare => "adl_self_care",
            Self::AssessmentJustification => "assessment_justification",
            Self::CognitiveStatus => "cognitive_status",
            Self::Sensory => "sensory",
            Self::Equipment => "equipment",
            Self::ProstheticOrthotic => "prosthetic_orthotic",
            Self::PatientCaregiverEducation => "patient_caregiver_education",
            Self::SkilledCareProvidedThisVisit => "skilled_care_provided_this_visit",
            Self::ProblemListFunctionalLimitations => "problem_list_functional_limitations",
            Self::RehabPotential => "rehab_potential",
            Self::TreatmentAsToleratedBasicPoc => "treatment_as_tolerated_basic_poc",
            Self::ShortLongTermGoals => "short_long_term_goals",
            Self::StandardizedTests => "standardized_tests",
            Self::TreatmentInterventions => "treatment_interventions",
            Self::Signature => "signature",
        }
    }

    /// Canonical component identifier; templates may name a section by it.
    pub fn component_name(self) -> &'static str {
        match self {
            Self::Subjective => "SubjectiveSection",
            Self::Vitals => "VitalsSkillsSection",
            Self::Pain => "PainSkillsSection",
            Self::Medication => "MedicationSection",
            Self::LivingArrangements => "LivingArrangementsSkillsSection",
            Self::GaitMobilityTraining => "GaitMobilityTrainingSkillsSection",
            Self::MuscleStrengthRom => "MuscleStrengthROMSkillsSection",
            Self::Balance => "BalanceSkillsSection",
            Self::TransfersFunctionalIndependence => "TransfersFunctionalIndependenceSkillsSection",
            Self::AdlSelfCare => "ADLSelfCareSkillsSection",
            Self::AssessmentJustification => "AssessmentJustificationSkillsSection",
            Self::CognitiveStatus => "CognitiveStatusSkillsSection",
            Self::Sensory => "SensorySkillsSection",
            Self::Equipment => "EquipmentSkillsSection",
            Self::ProstheticOrthotic => "ProstheticOrthoticSkillsSection",
            Self::PatientCaregiverEducation => "PatientCaregiverEducationSkillsSection",
            Self::SkilledCareProvidedThisVisit => "SkilledCareProvidedThisVisitSkillsSection",
            Self::ProblemListFunctionalLimitations => "ProblemListFunctionalLimitationsSkillsSection",
            Self::RehabPotential => "RehabPotentialSkillsSection",
            Self::TreatmentAsToleratedBasicPoc => "TreatmentAsToleratedBasicPOCSkillsSection",
            Self::ShortLongTermGoals => "ShortLongTermGoalsSkillsSection",
            Self::StandardizedTests => "StandardizedTestsSection",
            Self::TreatmentInterventions => "TreatmentInterventionsSection",
            Self::Signature => "SignatureSection",
        }
    }

    /// Navigation icon class; generic icon for kinds without a dedicated one.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Vitals => "fas fa-heartbeat",
            Self::TransfersFunctionalIndependence | Self::GaitMobilityTraining => {
                "fas fa-walking"
            }
            Self::Pain => "fas fa-exclamation-triangle",
            Self::Subjective => "fas fa-user-md",
            Self::Medication => "fas fa-pills",
            Self::LivingArrangements => "fas fa-home",
            Self::MuscleStrengthRom => "fas fa-dumbbell",
            Self::Balance => "fas fa-balance-scale",
            Self::AdlSelfCare => "fas fa-hands",
            Self::StandardizedTests => "fas fa-clipboard-check",
            Self::ProblemListFunctionalLimitations => "fas fa-list-ul",
            Self::AssessmentJustification => "fas fa-stethoscope",
            Self::RehabPotential => "fas fa-chart-line",
            Self::TreatmentInterventions => "fas fa-therapy",
            Self::SkilledCareProvidedThisVisit => "fas fa-user-nurse",
            Self::ShortLongTermGoals => "fas fa-bullseye",
            Self::Signature => "fas fa-signature",
            _ => DEFAULT_SECTION_ICON,
        }
    }

    /// Maps a server-declared section name to its kind.
    ///
    /// Runs of whitespace are collapsed and the name is trimmed before an
    /// exact, case-sensitive lookup. Labels from the name table win; a name
    /// that is already a component identifier resolves to that kind.
    pub fn from_section_name(section_name: &str) -> Option<Self> {
        let normalized = normalize_section_name(section_name);
        SECTION_NAME_TABLE
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, kind)| *kind)
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|kind| kind.component_name() == normalized)
            })
    }
}

/// Collapses whitespace runs and trims a section name.
pub fn normalize_section_name(section_name: &str) -> String {
    WHITESPACE_RE
        .replace_all(section_name.trim(), " ")
        .into_owned()
}

/// Icon for an optional kind, generic when unmapped.
pub fn icon_for(kind: Option<SectionKind>) -> &'static str {
    kind.map_or(DEFAULT_SECTION_ICON, SectionKind::icon)
}
