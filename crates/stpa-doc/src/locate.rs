//! Section and step location
//!
//! Finds the `[start, end)` spans owned by section headings and guided-step
//! markers, and synthesizes missing section headings inside the correct step.
//! A section span ends at the first subsequent heading of *any* recognized
//! shape, so a section can never swallow a sibling's content.

use crate::lines::DocText;
use std::ops::Range;
use stpa_schema::{
    entry_regex, heading_label, heading_matches, is_any_heading, step_marker, EntryId, GuidedStep,
    Kind,
};

/// Span of one section: its heading line and its `[start, end)` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Index of the heading line
    pub heading: usize,
    /// First body line (heading + 1)
    pub start: usize,
    /// One past the last body line
    pub end: usize,
}

/// Outcome of [`ensure_section`]: the span, and whether the heading had to be
/// synthesized (in which case the document was mutated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsuredSection {
    /// The live span of the section
    pub span: SectionSpan,
    /// True when the heading was created by this call
    pub created: bool,
}

/// Location failures. Missing sections are created on demand; a missing step
/// marker is a hard error because there is nowhere to create them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocateError {
    /// The marker of the owning guided step is absent from the document.
    #[error("no '## Step {}' marker found in the document", step.number())]
    StepMarkerMissing {
        /// The step whose marker is missing
        step: GuidedStep,
    },
}

/// Find the span owned by a heading satisfying `matches`.
fn find_span_by(lines: &[String], matches: impl Fn(&str) -> bool) -> Option<SectionSpan> {
    let heading = lines.iter().position(|l| matches(l))?;
    let start = heading + 1;
    let end = lines[start..]
        .iter()
        .position(|l| is_any_heading(l))
        .map_or(lines.len(), |off| start + off);
    Some(SectionSpan {
        heading,
        start,
        end,
    })
}

/// Find the span of `kind`'s section, in any heading style.
#[must_use]
pub fn find_section_span(lines: &[String], kind: Kind) -> Option<SectionSpan> {
    find_span_by(lines, |l| heading_matches(kind, l))
}

/// Find the span of the section with the given tag (underscore or space
/// style, case-insensitive).
#[must_use]
pub fn find_tag_span(lines: &[String], tag: &str) -> Option<SectionSpan> {
    let want = tag.trim().to_ascii_uppercase().replace(' ', "_");
    find_span_by(lines, |l| {
        heading_label(l).is_some_and(|label| {
            label.trim().to_ascii_uppercase().replace(' ', "_") == want
        })
    })
}

/// Find the body range of a guided step: from the line after its marker to
/// the next step marker or end of document.
#[must_use]
pub fn find_step_body(lines: &[String], step: GuidedStep) -> Option<Range<usize>> {
    let marker = lines.iter().position(|l| step_marker(l) == Some(step))?;
    let start = marker + 1;
    let end = lines[start..]
        .iter()
        .position(|l| step_marker(l).is_some())
        .map_or(lines.len(), |off| start + off);
    Some(start..end)
}

/// Heading label style used when synthesizing a section heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadingStyle {
    Underscore,
    Space,
}

/// Pick the label style already dominant among headings in `range`,
/// defaulting to underscore when no multi-word precedent exists.
fn dominant_style(lines: &[String], range: Range<usize>) -> HeadingStyle {
    let mut spaces = 0usize;
    let mut underscores = 0usize;
    for line in &lines[range] {
        if let Some(label) = heading_label(line) {
            if label.contains(' ') {
                spaces += 1;
            } else if label.contains('_') {
                underscores += 1;
            }
        }
    }
    if spaces > underscores {
        HeadingStyle::Space
    } else {
        HeadingStyle::Underscore
    }
}

/// Locate `kind`'s section, synthesizing the heading just before the end of
/// the owning step's body when absent.
///
/// This is a mutating lookup: when `created` is true the document has gained
/// a heading line (and possibly a separating blank line).
pub fn ensure_section(doc: &mut DocText, kind: Kind) -> Result<EnsuredSection, LocateError> {
    if let Some(span) = find_section_span(doc.lines(), kind) {
        return Ok(EnsuredSection {
            span,
            created: false,
        });
    }
    let step = kind.step();
    let body = find_step_body(doc.lines(), step)
        .ok_or(LocateError::StepMarkerMissing { step })?;

    let label = match dominant_style(doc.lines(), body.clone()) {
        HeadingStyle::Underscore => kind.section().to_string(),
        HeadingStyle::Space => kind.section().replace('_', " "),
    };
    let mut at = body.end;
    // Keep a blank line between the previous content and the new heading.
    if at > body.start && !doc.lines()[at - 1].trim().is_empty() {
        doc.insert(at, String::new());
        at += 1;
    }
    doc.insert(at, format!("[{label}]"));
    tracing::debug!(section = kind.section(), line = at, "synthesized section heading");
    Ok(EnsuredSection {
        span: SectionSpan {
            heading: at,
            start: at + 1,
            end: at + 1,
        },
        created: true,
    })
}

/// Line index where a new entry of `kind` should be inserted: right after the
/// last existing entry of the kind, or right after the heading when the
/// section is empty. Creates the section first when missing.
pub fn find_insert_line(doc: &mut DocText, kind: Kind) -> Result<usize, LocateError> {
    let ensured = ensure_section(doc, kind)?;
    let span = ensured.span;
    let re = entry_regex(kind);
    let last_entry = doc.lines()[span.start..span.end]
        .iter()
        .rposition(|l| re.is_match(l))
        .map(|off| span.start + off);
    Ok(last_entry.map_or(span.start, |idx| idx + 1))
}

/// Find the line defining `id`, i.e. the entry line of `id.kind` whose
/// numeric suffix matches, anywhere in the document.
#[must_use]
pub fn find_entry_line(lines: &[String], id: EntryId) -> Option<usize> {
    let re = entry_regex(id.kind);
    lines.iter().position(|l| {
        re.captures(l)
            .and_then(|c| c.get(1)?.as_str().parse::<u32>().ok())
            .is_some_and(|num| num == id.num)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "\
## Step 1 Fundamentals

[LOSSES]
L1: Loss of life.
L2: Loss of the vehicle.

[HAZARDS]
H1: Doors open in motion. (leads_to: L1)

## Step 2 Control structure

[CONTROLLERS]
CTRL1: Door controller.
";

    fn lines(text: &str) -> Vec<String> {
        DocText::from_text(text).lines().to_vec()
    }

    #[test]
    fn section_span_ends_at_next_heading() {
        let lines = lines(DOC);
        let span = find_section_span(&lines, Kind::Loss).unwrap();
        assert_eq!(span.heading, 2);
        assert_eq!(span.start..span.end, 3..6);
        // The blank line belongs to the span; the next heading does not.
        assert_eq!(lines[span.end], "[HAZARDS]");
    }

    #[test]
    fn section_span_terminates_at_step_marker() {
        let lines = lines(DOC);
        let span = find_section_span(&lines, Kind::Hazard).unwrap();
        assert_eq!(lines[span.end], "## Step 2 Control structure");
    }

    #[test]
    fn step_body_ranges() {
        let lines = lines(DOC);
        let step1 = find_step_body(&lines, GuidedStep::Step1).unwrap();
        assert_eq!(step1, 1..9);
        let step2 = find_step_body(&lines, GuidedStep::Step2).unwrap();
        assert_eq!(step2.end, lines.len());
        assert_eq!(find_step_body(&lines, GuidedStep::Step3), None);
    }

    #[test]
    fn ensure_existing_section_does_not_mutate() {
        let mut doc = DocText::from_text(DOC);
        let before = doc.clone();
        let ensured = ensure_section(&mut doc, Kind::Loss).unwrap();
        assert!(!ensured.created);
        assert_eq!(doc, before);
    }

    #[test]
    fn ensure_missing_section_synthesizes_before_step_end() {
        let mut doc = DocText::from_text(DOC);
        let ensured = ensure_section(&mut doc, Kind::SafetyConstraint).unwrap();
        assert!(ensured.created);
        let heading = &doc.lines()[ensured.span.heading];
        assert_eq!(heading, "[SAFETY_CONSTRAINTS]");
        // Inserted inside Step 1, before the Step 2 marker.
        let step1 = find_step_body(doc.lines(), GuidedStep::Step1).unwrap();
        assert!(step1.contains(&ensured.span.heading));
    }

    #[test]
    fn ensure_matches_space_style_precedent() {
        let text = "\
## Step 1

=== SYSTEM LOSSES AND MORE ===
stuff

[HAZARDS]
H1: Something. (leads_to: L1)
";
        // One space-style heading, no underscore precedent.
        let mut doc = DocText::from_text(text);
        let ensured = ensure_section(&mut doc, Kind::SafetyConstraint).unwrap();
        assert_eq!(doc.lines()[ensured.span.heading], "[SAFETY CONSTRAINTS]");
    }

    #[test]
    fn ensure_fails_without_step_marker() {
        let mut doc = DocText::from_text("[LOSSES]\nL1: Something bad.\n");
        let err = ensure_section(&mut doc, Kind::Uca).unwrap_err();
        assert!(matches!(
            err,
            LocateError::StepMarkerMissing {
                step: GuidedStep::Step3
            }
        ));
    }

    #[test]
    fn insert_line_after_last_entry() {
        let mut doc = DocText::from_text(DOC);
        let idx = find_insert_line(&mut doc, Kind::Loss).unwrap();
        assert_eq!(doc.lines()[idx - 1], "L2: Loss of the vehicle.");
    }

    #[test]
    fn insert_line_in_empty_section() {
        let mut doc = DocText::from_text("## Step 1\n\n[LOSSES]\n");
        let idx = find_insert_line(&mut doc, Kind::Loss).unwrap();
        assert_eq!(idx, 3);
    }

    #[test]
    fn entry_line_lookup() {
        let lines = lines(DOC);
        let idx = find_entry_line(&lines, EntryId::new(Kind::Loss, 2)).unwrap();
        assert_eq!(lines[idx], "L2: Loss of the vehicle.");
        assert_eq!(find_entry_line(&lines, EntryId::new(Kind::Loss, 9)), None);
    }

    #[test]
    fn tag_span_finds_system_description() {
        let lines = lines("[SYSTEM_DESCRIPTION]\nAn automated train.\n\n## Step 1\n");
        let span = find_tag_span(&lines, "SYSTEM DESCRIPTION").unwrap();
        assert_eq!(span.start..span.end, 1..3);
    }
}
