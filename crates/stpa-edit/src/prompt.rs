//! Prompt construction
//!
//! All prompts sent to the text generator are built here so the contract a
//! candidate line must satisfy is stated in one place, in the same terms the
//! validators enforce.

use stpa_schema::{EntryId, Kind};

/// The one-line format contract a generated body must satisfy for `kind`.
/// Anchored variants interpolate the concrete target so the generator cannot
/// pick a different one.
#[must_use]
pub fn format_contract(kind: Kind, anchor: Option<EntryId>) -> String {
    match kind {
        Kind::Loss => {
            "One short sentence describing the loss. No ID prefix, no parentheses.".to_string()
        }
        Kind::Hazard => "One sentence describing the hazardous system state, ending with the \
                         losses it leads to, e.g. '... (leads_to: L1, L2)'."
            .to_string(),
        Kind::SafetyConstraint => "One sentence stating the constraint, ending with the hazards \
                                   it addresses, e.g. '... (addresses: H1)'."
            .to_string(),
        Kind::RefinedHazard => {
            let target = anchor.map_or_else(|| "H<n>".to_string(), |id| id.to_string());
            format!(
                "One sentence refining the hazard, ending with exactly \
                 '(refines: {target})'."
            )
        }
        Kind::Uca => {
            let target = anchor.map_or_else(|| "LOOP<n>".to_string(), |id| id.to_string());
            format!(
                "One sentence describing the unsafe control action, ending with \
                 '(control loop: {target}; related: H1, H2)' where the related list names \
                 existing hazards."
            )
        }
        Kind::LossScenario => {
            let target = anchor.map_or_else(|| "UCA<n>".to_string(), |id| id.to_string());
            format!("One sentence describing the causal scenario, ending with '(uca: {target})'.")
        }
        Kind::ControlLoop => "One sentence naming the loop's controller (CTRL<n>), controlled \
                              process (PROC<n>), control action (CA<n>) and feedback (FB<n>) \
                              by their IDs. No relation parenthetical."
            .to_string(),
        _ => "One short descriptive sentence. No ID prefix, no parentheses.".to_string(),
    }
}

/// Stricter reminder appended on retry, after a first attempt failed
/// validation.
#[must_use]
pub fn strict_reminder(kind: Kind, anchor: Option<EntryId>) -> String {
    format!(
        "Your previous answer was rejected. Output ONLY the requested line(s), one per line, \
         with no preamble, numbering, markdown or explanations. Each line must satisfy: {}",
        format_contract(kind, anchor)
    )
}

/// Prompt for adding new entries of `kind`.
#[must_use]
pub fn add_prompt(
    kind: Kind,
    instruction: &str,
    context: &str,
    section_excerpt: &str,
    anchor: Option<EntryId>,
) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are extending a structured safety-analysis document.\n\n");
    if !context.trim().is_empty() {
        prompt.push_str("System context:\n");
        prompt.push_str(context.trim_end());
        prompt.push_str("\n\n");
    }
    if !section_excerpt.trim().is_empty() {
        prompt.push_str(&format!("Existing entries in [{}]:\n", kind.section()));
        prompt.push_str(section_excerpt.trim_end());
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("Instruction: {}\n\n", instruction.trim()));
    prompt.push_str(&format!(
        "Write the new {} entry (or entries, if the instruction asks for several).\n\
         Format, one entry per line, without any ID prefix:\n{}\n\
         Stay strictly within the system context above; do not invent components \
         that are not mentioned there.",
        kind.display_name(),
        format_contract(kind, anchor)
    ));
    prompt
}

/// Prompt for rewriting one existing entry in place.
#[must_use]
pub fn update_prompt(id: EntryId, current_line: &str, instruction: &str, context: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are revising one entry of a structured safety-analysis document.\n\n");
    if !context.trim().is_empty() {
        prompt.push_str("System context:\n");
        prompt.push_str(context.trim_end());
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("Current entry:\n{current_line}\n\n"));
    prompt.push_str(&format!("Instruction: {}\n\n", instruction.trim()));
    prompt.push_str(&format!(
        "Output exactly one line: the revised entry, starting with '{id}:' and satisfying: {}",
        format_contract(id.kind, None)
    ));
    prompt
}

/// Prompt asking for a repair plan, as JSON, for the listed coverage gaps.
/// The plan is advisory; it is validated and shown, never auto-applied.
#[must_use]
pub fn repair_prompt(gaps: &str, allowed_sections: &[&str], context: &str) -> String {
    let sections = allowed_sections.join(", ");
    let mut prompt = String::new();
    prompt.push_str("A consistency check of a safety-analysis document found gaps:\n");
    prompt.push_str(gaps.trim_end());
    prompt.push_str("\n\n");
    if !context.trim().is_empty() {
        prompt.push_str("System context:\n");
        prompt.push_str(context.trim_end());
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!(
        "Propose a repair plan as a single JSON object and nothing else:\n\
         {{\"title\": \"...\", \"summary\": \"...\", \"actions\": [\n\
           {{\"op\": \"add\", \"section\": \"...\", \"lines\": [\"...\"], \"note\": \"...\"}}\n\
         ]}}\n\
         Only \"add\" actions are allowed, and only in these sections: {sections}.\n\
         Each line must follow the section's entry format, without an ID prefix."
    ));
    prompt
}
