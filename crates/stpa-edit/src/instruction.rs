//! Instruction inference
//!
//! Turns a free-form edit instruction (English or Hebrew) into typed facts:
//! which entity kind it talks about, whether it adds, updates or deletes, and
//! which existing entry it names. Inference is deliberately shallow; anything
//! it cannot resolve is reported as an error instead of guessed at.

use crate::error::EditError;
use once_cell::sync::Lazy;
use regex::Regex;
use stpa_schema::{EntryId, Kind};

/// The three supported mutation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Append a new entry to its section
    Add,
    /// Rewrite an existing entry in place
    Update,
    /// Remove an existing entry
    Delete,
}

/// What the instruction resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionFacts {
    /// The entity kind being edited
    pub kind: Kind,
    /// The operation
    pub op: EditOp,
    /// The first entry ID mentioned, if any. For updates and deletes this is
    /// the target; for refined hazards it is the anchor being refined.
    pub explicit_id: Option<EntryId>,
}

static DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(delete|remove|drop|erase)\b|מחק|הסר").expect("delete regex")
});

static UPDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(update|change|modify|rewrite|revise|edit)\b|עדכן|שנה")
        .expect("update regex")
});

static REFINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brefine(?:ment|d|s)?\b|עידון|פירוט").expect("refine regex"));

/// Keyword patterns for kind inference, most specific phrasing first so that
/// "loss scenario" never resolves to a loss and "unsafe control action"
/// never resolves to a control action. English keywords are bounded whole
/// words; Hebrew synonyms match as written so inflected forms still resolve.
static KIND_PATTERNS: Lazy<Vec<(Kind, Regex)>> = Lazy::new(|| {
    [
        (
            Kind::LossScenario,
            r"(?i)\bloss scenario\b|\bscenarios?\b|תרחיש",
        ),
        (
            Kind::Uca,
            r"(?i)\bunsafe control action\b|\bucas?\b|לא בטוחה",
        ),
        (Kind::ControlLoop, r"(?i)\bcontrol loops?\b|לולאת בקרה|לולאה"),
        (
            Kind::ControlledProcess,
            r"(?i)\bcontrolled process(?:es)?\b|\bprocess(?:es)?\b|תהליך מבוקר|תהליך",
        ),
        (Kind::ControlAction, r"(?i)\bcontrol actions?\b|פעולת בקרה"),
        (Kind::Controller, r"(?i)\bcontrollers?\b|בקר"),
        (Kind::Actuator, r"(?i)\bactuators?\b|מפעיל"),
        (Kind::Sensor, r"(?i)\bsensors?\b|חיישן"),
        (
            Kind::ExternalSystem,
            r"(?i)\bexternal systems?\b|מערכת חיצונית",
        ),
        (
            Kind::RefinedHazard,
            r"(?i)\brefined hazards?\b|\brefinements?\b|עידון",
        ),
        (
            Kind::SafetyConstraint,
            r"(?i)\bsafety constraints?\b|\bconstraints?\b|אילוץ",
        ),
        (Kind::Hazard, r"(?i)\bhazards?\b|סיכון|מפגע"),
        (Kind::Loss, r"(?i)\bloss(?:es)?\b|אובדן|אבדן"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("kind keyword regex")))
    .collect()
});

fn keyword_kind(instruction: &str) -> Option<Kind> {
    KIND_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(instruction))
        .map(|(kind, _)| *kind)
}

/// Infer the facts of an instruction.
///
/// Resolution order: operation wording first, then the kind. An explicit ID
/// token takes precedence and determines the kind directly; the keyword
/// table is tried only when no ID is present. Refinement wording redirects a
/// hazard to a refined hazard while keeping the hazard ID as the anchor. An
/// instruction naming no recognizable kind is rejected.
pub fn infer(instruction: &str) -> Result<InstructionFacts, EditError> {
    let explicit_id = EntryId::first_in(instruction);

    let op = if DELETE_RE.is_match(instruction) {
        EditOp::Delete
    } else if UPDATE_RE.is_match(instruction) {
        EditOp::Update
    } else {
        EditOp::Add
    };

    let mut kind = explicit_id
        .map(|id| id.kind)
        .or_else(|| keyword_kind(instruction))
        .ok_or_else(|| EditError::KindUnresolved(instruction.trim().to_string()))?;

    if kind == Kind::Hazard && REFINE_RE.is_match(instruction) {
        kind = Kind::RefinedHazard;
    }

    Ok(InstructionFacts {
        kind,
        op,
        explicit_id,
    })
}
