//! Edit plans
//!
//! A plan is a small JSON-expressible batch of section-scoped actions. The
//! engine uses plans in two places: repair proposals coming back from the
//! generator (parsed, validated, shown to the user) and explicit plan
//! application (validated, then applied all-or-nothing).

use crate::error::EditError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use stpa_doc::{find_insert_line, find_step_body, find_tag_span, DocText};
use stpa_schema::{validate_lines, GuidedStep, Kind};

/// A validated batch of edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPlan {
    /// Identifier callers use to refer back to a proposed plan. Assigned
    /// locally when the source JSON carries none.
    #[serde(default)]
    pub id: String,
    /// Short human-readable title
    pub title: String,
    /// What the plan achieves
    #[serde(default)]
    pub summary: String,
    /// The actions, applied in order
    pub actions: Vec<EditAction>,
}

/// One section-scoped action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditAction {
    /// Tag of the target section, underscore or space style
    pub section: String,
    /// The mutation
    #[serde(flatten)]
    pub op: ActionOp,
    /// Optional rationale shown to the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The mutation shape of an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ActionOp {
    /// Append lines to the section
    Add {
        /// Entry bodies, without ID prefixes
        lines: Vec<String>,
    },
    /// Replace the first section line containing `matches`
    Replace {
        /// Substring locating the target line
        matches: String,
        /// The full replacement line
        replacement: String,
    },
    /// Delete the first section line containing `matches`
    Delete {
        /// Substring locating the target line
        matches: String,
    },
}

/// What a plan is allowed to touch.
#[derive(Debug, Clone)]
pub struct PlanScope {
    /// Restrict all actions to this guided step's body, when set
    pub step: Option<GuidedStep>,
    /// Canonical section tags actions may target; empty means any section
    pub allowed_sections: Vec<&'static str>,
}

impl PlanScope {
    /// A scope with no restrictions.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            step: None,
            allowed_sections: Vec::new(),
        }
    }

    /// A scope confined to the given sections.
    #[must_use]
    pub fn sections(allowed: &[&'static str]) -> Self {
        Self {
            step: None,
            allowed_sections: allowed.to_vec(),
        }
    }
}

/// One applied action, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedChange {
    /// Canonical tag of the touched section
    pub section: String,
    /// The lines as they now stand in the document (empty for deletions)
    pub lines: Vec<String>,
    /// Line range the change occupies after application
    pub range: Range<usize>,
}

fn action_kind(action: &EditAction) -> Result<Kind, EditError> {
    Kind::from_section_label(&action.section).ok_or_else(|| {
        EditError::PlanRejected(format!("unknown section {:?}", action.section))
    })
}

static PLAN_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_plan_id() -> String {
    format!("plan-{}", PLAN_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Parse a plan out of raw generator output.
///
/// Tolerates code fences and surrounding prose by extracting the outermost
/// JSON object. A plan without an `id` gets a locally unique one. Structure
/// errors are returned as strings so the caller can decide whether they are
/// fatal.
pub fn parse_repair_plan(raw: &str) -> Result<EditPlan, String> {
    let stripped: String = raw
        .lines()
        .filter(|l| !l.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    let start = stripped.find('{').ok_or("no JSON object in output")?;
    let end = stripped.rfind('}').ok_or("no JSON object in output")?;
    if end < start {
        return Err("no JSON object in output".to_string());
    }
    let mut plan: EditPlan = serde_json::from_str(&stripped[start..=end])
        .map_err(|e| format!("malformed plan JSON: {e}"))?;
    if plan.id.is_empty() {
        plan.id = next_plan_id();
    }
    Ok(plan)
}

/// Validate a plan against a scope: known sections, allow-list membership,
/// and per-kind grammar for every added or replacing line. Repair plans must
/// additionally be add-only; pass `add_only` accordingly.
pub fn validate_plan(plan: &EditPlan, scope: &PlanScope, add_only: bool) -> Result<(), EditError> {
    if plan.actions.is_empty() {
        return Err(EditError::PlanRejected("plan has no actions".to_string()));
    }
    for action in &plan.actions {
        let kind = action_kind(action)?;
        if let Some(step) = scope.step {
            if kind.step() != step {
                return Err(EditError::ScopeViolation {
                    section: kind.section().to_string(),
                    step,
                });
            }
        }
        if !scope.allowed_sections.is_empty()
            && !scope.allowed_sections.contains(&kind.section())
        {
            return Err(EditError::PlanRejected(format!(
                "section {} is not in the allowed set",
                kind.section()
            )));
        }
        match &action.op {
            ActionOp::Add { lines } => {
                if lines.is_empty() {
                    return Err(EditError::PlanRejected(
                        "add action with no lines".to_string(),
                    ));
                }
                // Added lines carry no IDs yet; prefix a placeholder head so
                // the contract regex can be applied.
                let headed: Vec<String> = lines
                    .iter()
                    .map(|l| format!("{}1: {}", kind.id_prefix(), l.trim()))
                    .collect();
                validate_lines(kind, &headed)
                    .map_err(|e| EditError::PlanRejected(e.to_string()))?;
            }
            ActionOp::Replace { replacement, .. } => {
                if add_only {
                    return Err(EditError::PlanRejected(
                        "only add actions are allowed here".to_string(),
                    ));
                }
                validate_lines(kind, std::slice::from_ref(replacement))
                    .map_err(|e| EditError::PlanRejected(e.to_string()))?;
            }
            ActionOp::Delete { .. } => {
                if add_only {
                    return Err(EditError::PlanRejected(
                        "only add actions are allowed here".to_string(),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Apply a validated plan to the document text.
///
/// All-or-nothing: the original text is untouched unless every action
/// succeeds. Added lines get fresh IDs at application time.
pub fn apply_plan(
    text: &str,
    plan: &EditPlan,
    scope: &PlanScope,
) -> Result<(String, Vec<AppliedChange>), EditError> {
    validate_plan(plan, scope, false)?;
    let mut doc = DocText::from_text(text);
    let mut changes = Vec::new();

    for action in &plan.actions {
        let kind = action_kind(action)?;
        match &action.op {
            ActionOp::Add { lines } => {
                let at = find_insert_line(&mut doc, kind)?;
                check_in_step(doc.lines(), at, scope, true)?;
                let mut next = stpa_doc::next_free_id(doc.lines(), kind);
                let headed: Vec<String> = lines
                    .iter()
                    .map(|l| {
                        let line = format!("{}{}: {}", kind.id_prefix(), next, l.trim());
                        next += 1;
                        line
                    })
                    .collect();
                doc.insert_many(at, headed.clone());
                changes.push(AppliedChange {
                    section: kind.section().to_string(),
                    range: at..at + headed.len(),
                    lines: headed,
                });
            }
            ActionOp::Replace {
                matches,
                replacement,
            } => {
                let idx = find_matching_line(&doc, kind, matches)?;
                check_in_step(doc.lines(), idx, scope, false)?;
                doc.replace(idx, replacement.clone());
                changes.push(AppliedChange {
                    section: kind.section().to_string(),
                    range: idx..idx + 1,
                    lines: vec![replacement.clone()],
                });
            }
            ActionOp::Delete { matches } => {
                let idx = find_matching_line(&doc, kind, matches)?;
                check_in_step(doc.lines(), idx, scope, false)?;
                doc.remove(idx);
                changes.push(AppliedChange {
                    section: kind.section().to_string(),
                    range: idx..idx,
                    lines: Vec::new(),
                });
            }
        }
    }
    Ok((doc.to_text(), changes))
}

// An insertion index equal to the body's end still lands inside the step.
fn check_in_step(
    lines: &[String],
    idx: usize,
    scope: &PlanScope,
    insertion: bool,
) -> Result<(), EditError> {
    let Some(step) = scope.step else {
        return Ok(());
    };
    let body = find_step_body(lines, step)
        .ok_or(stpa_doc::LocateError::StepMarkerMissing { step })?;
    if body.contains(&idx) || (insertion && idx == body.end) {
        Ok(())
    } else {
        Err(EditError::PlanRejected(format!(
            "action lands outside {step}"
        )))
    }
}

fn find_matching_line(doc: &DocText, kind: Kind, needle: &str) -> Result<usize, EditError> {
    let span = find_tag_span(doc.lines(), kind.section()).ok_or_else(|| {
        EditError::PlanRejected(format!("section {} not present", kind.section()))
    })?;
    (span.start..span.end)
        .find(|&i| doc.lines()[i].contains(needle))
        .ok_or_else(|| {
            EditError::PlanRejected(format!(
                "no line in {} matches {needle:?}",
                kind.section()
            ))
        })
}
