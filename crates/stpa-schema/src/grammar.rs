//! Line and heading grammars
//!
//! Every kind carries a hand-specified line contract (regex over the whole
//! line) and a heading grammar. A single non-conforming line invalidates the
//! whole batch; validation never mutates anything.

use crate::ids::{EntryId, PREFIX_ALTERNATION};
use crate::kind::{GuidedStep, Kind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Section tag holding the free-text system description used for grounding.
pub const SYSTEM_DESCRIPTION_TAG: &str = "SYSTEM_DESCRIPTION";

// Entry recognition: `PREFIX<digits>: body`, per kind. Looser than the
// contract below; used to locate entries, not to accept generated content.
static ENTRY_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    Kind::ALL
        .iter()
        .map(|k| {
            Regex::new(&format!(r"^\s*{}(\d+):\s*(.*)$", k.id_prefix())).expect("entry regex")
        })
        .collect()
});

static ENTRY_HEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*({PREFIX_ALTERNATION})(\d+):\s*")).expect("entry head regex")
});

static RELATION_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*(?:leads_to|addresses|refines|uca|control\s+loop)\s*:[^)]*\)")
        .expect("relation block regex")
});

// Strict per-kind contracts for generated lines.
static CONTRACT_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    Kind::ALL
        .iter()
        .map(|k| Regex::new(contract_pattern(*k)).expect("contract regex"))
        .collect()
});

static LOOP_MENTIONS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"\bCTRL\d+\b").expect("loop mention"),
        Regex::new(r"\bPROC\d+\b").expect("loop mention"),
        Regex::new(r"\bCA\d+\b").expect("loop mention"),
        Regex::new(r"\bFB\d+\b").expect("loop mention"),
    ]
});

fn contract_pattern(kind: Kind) -> &'static str {
    match kind {
        Kind::Loss => r"^L\d+:\s+\S.*$",
        Kind::Hazard => r"^H\d+:\s+.*\(leads_to:\s*L\d+(?:\s*,\s*L\d+)*\)\s*$",
        Kind::SafetyConstraint => r"^SC\d+:\s+.*\(addresses:\s*H\d+(?:\s*,\s*H\d+)*\)\s*$",
        Kind::RefinedHazard => r"^RH\d+:\s+.*\(refines:\s*H\d+\)\s*$",
        Kind::Controller => r"^CTRL\d+:\s+\S.*$",
        Kind::ControlledProcess => r"^PROC\d+:\s+\S.*$",
        Kind::Actuator => r"^ACT\d+:\s+\S.*$",
        Kind::Sensor => r"^SEN\d+:\s+\S.*$",
        Kind::ExternalSystem => r"^EXT\d+:\s+\S.*$",
        Kind::ControlAction => r"^CA\d+:\s+\S.*$",
        Kind::Feedback => r"^FB\d+:\s+\S.*$",
        Kind::ControlLoop => r"^LOOP\d+:\s+\S.*$",
        Kind::Uca => {
            r"^UCA\d+:\s+.*\(control\s+loop:\s*LOOP\d+;\s*related:\s*H\d+(?:\s*,\s*H\d+)*\)\s*$"
        }
        Kind::LossScenario => r"^LS\d+:\s+.*\(uca:\s*UCA\d+\)\s*$",
    }
}

fn contract_hint(kind: Kind) -> &'static str {
    match kind {
        Kind::Loss => "a loss line must not carry a relation parenthetical",
        Kind::Hazard => "a hazard line must end with (leads_to: L...)",
        Kind::SafetyConstraint => "a safety constraint line must end with (addresses: H...)",
        Kind::RefinedHazard => "a refined hazard line must end with (refines: H<n>)",
        Kind::ControlLoop => {
            "a control loop line must mention a CTRL, PROC, CA and FB token"
        }
        Kind::Uca => {
            "a UCA line must end with (control loop: LOOP<n>; related: H...)"
        }
        Kind::LossScenario => "a loss scenario line must end with (uca: UCA<n>)",
        _ => "expected PREFIX<n>: description with no relation parenthetical",
    }
}

/// A generated or edited line failed its kind's contract.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {kind} line {line:?}: {hint}")]
pub struct GrammarError {
    /// Human-readable kind name
    pub kind: &'static str,
    /// The offending line
    pub line: String,
    /// What the contract expects
    pub hint: &'static str,
}

impl GrammarError {
    fn new(kind: Kind, line: &str) -> Self {
        Self {
            kind: kind.display_name(),
            line: line.to_string(),
            hint: contract_hint(kind),
        }
    }
}

/// Recognition regex for entries of a kind (`PREFIX<digits>: body`).
#[inline]
#[must_use]
pub fn entry_regex(kind: Kind) -> &'static Regex {
    &ENTRY_RES[kind as usize]
}

/// Parse the leading `PREFIX<digits>:` head of a line, returning the ID and
/// the byte offset where the rest of the line starts.
#[must_use]
pub fn entry_head(line: &str) -> Option<(EntryId, usize)> {
    let caps = ENTRY_HEAD_RE.captures(line)?;
    let kind = Kind::from_prefix(caps.get(1)?.as_str())?;
    let num = caps.get(2)?.as_str().parse().ok()?;
    Some((EntryId::new(kind, num), caps.get(0)?.end()))
}

/// Validate a batch of lines against a kind's contract.
///
/// All-or-nothing: the first violating line fails the whole batch.
pub fn validate_lines<S: AsRef<str>>(kind: Kind, lines: &[S]) -> Result<(), GrammarError> {
    for line in lines {
        let line = line.as_ref();
        if !CONTRACT_RES[kind as usize].is_match(line) {
            return Err(GrammarError::new(kind, line));
        }
        match kind {
            Kind::ControlLoop => {
                if !LOOP_MENTIONS.iter().all(|re| re.is_match(line)) {
                    return Err(GrammarError::new(kind, line));
                }
            }
            // Kinds whose contract is "plain description" must not smuggle a
            // relation parenthetical in the body.
            Kind::Loss
            | Kind::Controller
            | Kind::ControlledProcess
            | Kind::Actuator
            | Kind::Sensor
            | Kind::ExternalSystem
            | Kind::ControlAction
            | Kind::Feedback => {
                if RELATION_BLOCK_RE.is_match(line) {
                    return Err(GrammarError::new(kind, line));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Kinds a relation clause of `kind` may point at.
#[must_use]
pub fn relation_target_kinds(kind: Kind) -> &'static [Kind] {
    match kind {
        Kind::Hazard => &[Kind::Loss],
        Kind::SafetyConstraint | Kind::RefinedHazard => &[Kind::Hazard],
        Kind::Uca => &[Kind::ControlLoop, Kind::Hazard],
        Kind::LossScenario => &[Kind::Uca],
        _ => &[],
    }
}

/// Parse the relation references of an entry line, in textual order.
///
/// Only IDs inside the relation parenthetical count; body mentions (e.g. the
/// CTRL/PROC tokens of a control loop description) are not relations.
#[must_use]
pub fn parse_relations(kind: Kind, line: &str) -> Vec<EntryId> {
    let targets = relation_target_kinds(kind);
    if targets.is_empty() {
        return Vec::new();
    }
    RELATION_BLOCK_RE
        .find_iter(line)
        .flat_map(|block| EntryId::scan(block.as_str()))
        .filter(|id| targets.contains(&id.kind))
        .collect()
}

/// Byte span of the relation parenthetical, if the line carries one.
#[must_use]
pub fn relation_block_span(line: &str) -> Option<std::ops::Range<usize>> {
    RELATION_BLOCK_RE.find(line).map(|m| m.range())
}

// Heading grammar: `[LABEL]`, `=== LABEL ===`, or a `## Step <n>` marker.

static BRACKET_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[([A-Za-z][A-Za-z0-9 _-]*)\]\s*$").expect("bracket heading"));

static EQUALS_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*===\s*([A-Za-z][A-Za-z0-9 _-]*?)\s*===\s*$").expect("equals heading")
});

static STEP_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*##\s*step\s*([1-4])\b").expect("step marker"));

/// Extract the label of a bracketed or triple-equals heading.
#[must_use]
pub fn heading_label(line: &str) -> Option<&str> {
    BRACKET_HEADING_RE
        .captures(line)
        .or_else(|| EQUALS_HEADING_RE.captures(line))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Parse a guided-step marker line (`## Step <1-4> ...`).
#[must_use]
pub fn step_marker(line: &str) -> Option<GuidedStep> {
    STEP_MARKER_RE
        .captures(line)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
        .and_then(GuidedStep::from_number)
}

/// True for any recognized heading shape. Section spans terminate at the
/// first line for which this holds, whatever section it introduces.
#[must_use]
pub fn is_any_heading(line: &str) -> bool {
    heading_label(line).is_some() || step_marker(line).is_some()
}

/// True when the line is the heading of `kind`'s section, in any style.
#[must_use]
pub fn heading_matches(kind: Kind, line: &str) -> bool {
    heading_label(line)
        .and_then(Kind::from_section_label)
        .is_some_and(|k| k == kind)
}

/// True when the line is a system-description heading, in any style.
#[must_use]
pub fn is_system_description_heading(line: &str) -> bool {
    heading_label(line).is_some_and(|label| {
        label.trim().to_ascii_uppercase().replace(' ', "_") == SYSTEM_DESCRIPTION_TAG
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(kind: Kind, line: &str) {
        validate_lines(kind, &[line]).unwrap_or_else(|e| panic!("expected valid: {e}"));
    }

    fn bad(kind: Kind, line: &str) {
        assert!(
            validate_lines(kind, &[line]).is_err(),
            "expected invalid {kind} line: {line}"
        );
    }

    #[test]
    fn loss_contract() {
        ok(Kind::Loss, "L1: Loss of human life.");
        bad(Kind::Loss, "L1: Loss of life. (leads_to: L2)");
        bad(Kind::Loss, "L1:");
        bad(Kind::Loss, "Loss of life with no id");
    }

    #[test]
    fn hazard_contract() {
        ok(Kind::Hazard, "H1: Train departs with doors open. (leads_to: L1, L2)");
        bad(Kind::Hazard, "H1: Train departs with doors open.");
        bad(Kind::Hazard, "H1: Doors open. (addresses: L1)");
        bad(Kind::Hazard, "H1: Doors open. (leads_to: H2)");
    }

    #[test]
    fn constraint_contract() {
        ok(Kind::SafetyConstraint, "SC2: Doors must stay closed in motion. (addresses: H1)");
        bad(Kind::SafetyConstraint, "SC2: Doors must stay closed in motion.");
        bad(Kind::SafetyConstraint, "SC2: Doors closed. (addresses: L1)");
    }

    #[test]
    fn refined_hazard_contract() {
        ok(Kind::RefinedHazard, "RH1: Doors open above 5 km/h. (refines: H1)");
        bad(Kind::RefinedHazard, "RH1: Doors open above 5 km/h. (refines: H1, H2)");
        bad(Kind::RefinedHazard, "RH1: Doors open above 5 km/h.");
    }

    #[test]
    fn control_loop_contract() {
        ok(
            Kind::ControlLoop,
            "LOOP1: CTRL1 commands CA1 on PROC1 with FB1 speed reports.",
        );
        bad(Kind::ControlLoop, "LOOP1: CTRL1 commands CA1 on PROC1.");
        bad(Kind::ControlLoop, "LOOP1: controller commands actuator.");
    }

    #[test]
    fn uca_contract() {
        ok(
            Kind::Uca,
            "UCA5: Brake not applied when obstacle close. (control loop: LOOP1; related: H2)",
        );
        bad(Kind::Uca, "UCA5: Brake not applied. (related: H2)");
        bad(Kind::Uca, "UCA5: Brake not applied. (control loop: LOOP1)");
    }

    #[test]
    fn loss_scenario_contract() {
        ok(Kind::LossScenario, "LS1: Sensor drift hides obstacle. (uca: UCA2)");
        bad(Kind::LossScenario, "LS1: Sensor drift hides obstacle.");
    }

    #[test]
    fn plain_kinds_reject_relation_blocks() {
        ok(Kind::Controller, "CTRL1: Automatic train supervision.");
        bad(Kind::Controller, "CTRL1: Supervision. (addresses: H1)");
        ok(Kind::ControlAction, "CA1: Apply service brake.");
        bad(Kind::Feedback, "FB1: Speed report. (leads_to: L1)");
    }

    #[test]
    fn batch_fails_on_first_violation() {
        let lines = vec![
            "H1: Fine. (leads_to: L1)".to_string(),
            "H2: Missing relation.".to_string(),
        ];
        let err = validate_lines(Kind::Hazard, &lines).unwrap_err();
        assert!(err.line.contains("Missing relation"));
    }

    #[test]
    fn relations_parse_in_textual_order() {
        let rels = parse_relations(Kind::Hazard, "H1: text. (leads_to: L5, L2)");
        assert_eq!(
            rels,
            vec![EntryId::new(Kind::Loss, 5), EntryId::new(Kind::Loss, 2)]
        );
    }

    #[test]
    fn uca_relations_include_loop_and_hazards() {
        let rels = parse_relations(
            Kind::Uca,
            "UCA1: text. (control loop: LOOP1; related: H2, H4)",
        );
        assert_eq!(
            rels,
            vec![
                EntryId::new(Kind::ControlLoop, 1),
                EntryId::new(Kind::Hazard, 2),
                EntryId::new(Kind::Hazard, 4),
            ]
        );
    }

    #[test]
    fn body_mentions_are_not_relations() {
        let rels = parse_relations(Kind::ControlLoop, "LOOP1: CTRL1 acts via CA1 on PROC1, FB1.");
        assert!(rels.is_empty());
    }

    #[test]
    fn heading_shapes() {
        assert_eq!(heading_label("[LOSSES]"), Some("LOSSES"));
        assert_eq!(heading_label("=== SAFETY CONSTRAINTS ==="), Some("SAFETY CONSTRAINTS"));
        assert!(is_any_heading("## Step 2 Control structure"));
        assert!(is_any_heading("## step 4"));
        assert!(!is_any_heading("H1: not a heading. (leads_to: L1)"));
        assert_eq!(step_marker("## STEP 3 UCAs"), Some(GuidedStep::Step3));
        assert_eq!(step_marker("## Step 9"), None);
    }

    #[test]
    fn heading_matches_either_style() {
        assert!(heading_matches(Kind::SafetyConstraint, "[SAFETY_CONSTRAINTS]"));
        assert!(heading_matches(Kind::SafetyConstraint, "=== SAFETY CONSTRAINTS ==="));
        assert!(!heading_matches(Kind::SafetyConstraint, "[HAZARDS]"));
    }

    #[test]
    fn entry_head_parses() {
        let (id, rest) = entry_head("SC3: Keep doors closed. (addresses: H1)").unwrap();
        assert_eq!(id, EntryId::new(Kind::SafetyConstraint, 3));
        assert_eq!(&"SC3: Keep doors closed. (addresses: H1)"[rest..], "Keep doors closed. (addresses: H1)");
        assert!(entry_head("no id here").is_none());
    }
}
