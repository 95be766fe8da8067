//! Smart-edit orchestration
//!
//! Ties the layers together: infer what an instruction wants, gather the
//! grounding context, run the bounded generate/validate loop, mutate the
//! document, renumber, and report coverage findings with an optional repair
//! proposal. The input text is never mutated unless every validation passed;
//! all failure paths return the original document untouched.

use crate::config::EngineConfig;
use crate::error::EditError;
use crate::generator::{generate_validated, GenerateLoopError, TextGenerator};
use crate::instruction::{infer, EditOp, InstructionFacts};
use crate::plan::{parse_repair_plan, validate_plan, AppliedChange, EditPlan, PlanScope};
use crate::prompt;
use serde::Serialize;
use stpa_doc::{
    check_coverage, find_entry_line, find_insert_line, find_section_span, find_step_body,
    find_tag_span, next_free_id, normalize_document, validate_grounding, CoverageReport, DocText,
    LocateError,
};
use stpa_schema::{
    entry_head, parse_relations, validate_lines, EntryId, GuidedStep, Kind,
    SYSTEM_DESCRIPTION_TAG,
};

/// The editing scope of one conversation.
///
/// A scoped session confines every mutation to the sections of one guided
/// step; an unscoped session may touch the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditSession {
    step: Option<GuidedStep>,
}

impl EditSession {
    /// A session allowed to edit anywhere.
    #[inline]
    #[must_use]
    pub fn unscoped() -> Self {
        Self { step: None }
    }

    /// A session confined to one guided step.
    #[inline]
    #[must_use]
    pub fn scoped(step: GuidedStep) -> Self {
        Self { step: Some(step) }
    }

    /// The active step, if the session is scoped.
    #[inline]
    #[must_use]
    pub fn step(self) -> Option<GuidedStep> {
        self.step
    }
}

/// Result of one successful edit.
///
/// `changes` describes the mutation as it was applied; the subsequent
/// renumbering pass may shift line positions and IDs in `text`.
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    /// The resulting document text, renumbered and reference-consistent
    pub text: String,
    /// Human-readable summary of what happened
    pub message: String,
    /// The applied mutations
    pub changes: Vec<AppliedChange>,
    /// Advisory coverage findings over the resulting document
    pub report: CoverageReport,
    /// Proposed (never auto-applied) repair plan for the findings, if any
    pub repair_plan: Option<EditPlan>,
}

/// The engine: a text generator plus configuration.
#[derive(Debug)]
pub struct SmartEditEngine<G> {
    generator: G,
    config: EngineConfig,
}

impl<G: TextGenerator> SmartEditEngine<G> {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            config: EngineConfig::default(),
        }
    }

    /// Create an engine with an explicit configuration.
    #[must_use]
    pub fn with_config(generator: G, config: EngineConfig) -> Self {
        Self { generator, config }
    }

    /// The active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The wrapped generator.
    #[inline]
    #[must_use]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Run the coverage check without editing anything.
    #[must_use]
    pub fn review(&self, text: &str) -> CoverageReport {
        check_coverage(DocText::from_text(text).lines())
    }

    /// Apply a free-form instruction to the document.
    ///
    /// On success the returned text has been renumbered and its references
    /// remapped. On any error the caller's text stands unchanged.
    pub async fn apply_instruction(
        &self,
        text: &str,
        instruction: &str,
        session: EditSession,
    ) -> Result<EditOutcome, EditError> {
        let facts = infer(instruction)?;
        tracing::debug!(kind = %facts.kind, op = ?facts.op, id = ?facts.explicit_id, "instruction inferred");
        match facts.op {
            EditOp::Add => self.apply_add(text, facts, instruction, session).await,
            EditOp::Update => self.apply_update(text, facts, instruction, session).await,
            EditOp::Delete => self.apply_delete(text, facts, session).await,
        }
    }

    /// Apply a previously proposed (or hand-written) edit plan.
    pub async fn apply_edit_plan(
        &self,
        text: &str,
        plan: &EditPlan,
        session: EditSession,
    ) -> Result<EditOutcome, EditError> {
        let scope = PlanScope {
            step: session.step(),
            allowed_sections: Vec::new(),
        };
        let (new_text, changes) = crate::plan::apply_plan(text, plan, &scope)?;
        let message = format!(
            "Applied plan {:?} ({} action{}).",
            plan.title,
            plan.actions.len(),
            if plan.actions.len() == 1 { "" } else { "s" }
        );
        self.finish(new_text, message, changes, session).await
    }

    async fn apply_add(
        &self,
        text: &str,
        facts: InstructionFacts,
        instruction: &str,
        session: EditSession,
    ) -> Result<EditOutcome, EditError> {
        let kind = facts.kind;
        check_kind_scope(kind, session)?;

        // A refined hazard pins the relation target of every generated line
        // and cannot be added without naming the hazard it refines.
        let anchor = match kind {
            Kind::RefinedHazard => match facts.explicit_id {
                Some(id) if id.kind == Kind::Hazard => Some(id),
                _ => {
                    return Err(EditError::ExplicitIdRequired {
                        kind: Kind::Hazard.display_name(),
                    })
                }
            },
            _ => None,
        };

        let doc = DocText::from_text(text);
        if let Some(anchor) = anchor {
            if find_entry_line(doc.lines(), anchor).is_none() {
                return Err(EditError::NotFound { id: anchor });
            }
        }

        let context = self.grounding_context(doc.lines(), kind);
        let excerpt = find_section_span(doc.lines(), kind)
            .map(|span| doc.lines()[span.start..span.end].join("\n"))
            .unwrap_or_default();
        // Candidates ground against the description and the section's
        // current entries combined.
        let ground_ctx = format!("{context}\n{excerpt}");
        let request = prompt::add_prompt(kind, instruction, &context, &excerpt, anchor);
        let reminder = prompt::strict_reminder(kind, anchor);
        let start_id = next_free_id(doc.lines(), kind);
        let min_keywords = self.config.min_shared_keywords;

        let validate = |candidates: &[String]| -> Result<Vec<String>, String> {
            if candidates.is_empty() {
                return Err("no usable lines in the output".to_string());
            }
            let mut next = start_id;
            let mut headed = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                // The generator was told not to emit IDs; tolerate one of the
                // right shape by stripping it before assigning our own.
                let body = match entry_head(candidate) {
                    Some((_, rest)) => candidate[rest..].trim(),
                    None => candidate.trim(),
                };
                headed.push(format!("{}{}: {}", kind.id_prefix(), next, body));
                next += 1;
            }
            validate_lines(kind, &headed).map_err(|e| e.to_string())?;
            if let Some(anchor) = anchor {
                for line in &headed {
                    if !parse_relations(kind, line).contains(&anchor) {
                        return Err(format!("every entry must reference {anchor}"));
                    }
                }
            }
            validate_grounding(&headed, &ground_ctx, min_keywords).map_err(|e| e.to_string())?;
            Ok(headed)
        };

        let lines = generate_validated(
            &self.generator,
            &request,
            &reminder,
            self.config.max_generation_attempts,
            validate,
        )
        .await
        .map_err(|e| map_loop_error(kind, e))?;

        let mut doc = doc;
        let at = find_insert_line(&mut doc, kind)?;
        check_insert_scope(doc.lines(), at, kind, session)?;
        doc.insert_many(at, lines.clone());
        tracing::info!(kind = %kind, count = lines.len(), line = at, "entries added");

        let inserted: Vec<EntryId> = lines
            .iter()
            .filter_map(|l| entry_head(l).map(|(id, _)| id))
            .collect();
        let message = match inserted.as_slice() {
            [only] => format!("Added {only} to [{}].", kind.section()),
            many => format!("Added {} entries to [{}].", many.len(), kind.section()),
        };
        let changes = vec![AppliedChange {
            section: kind.section().to_string(),
            range: at..at + lines.len(),
            lines,
        }];
        self.finish(doc.to_text(), message, changes, session).await
    }

    async fn apply_update(
        &self,
        text: &str,
        facts: InstructionFacts,
        instruction: &str,
        session: EditSession,
    ) -> Result<EditOutcome, EditError> {
        let id = facts.explicit_id.ok_or(EditError::ExplicitIdRequired {
            kind: facts.kind.display_name(),
        })?;
        check_kind_scope(id.kind, session)?;

        let mut doc = DocText::from_text(text);
        let idx = find_entry_line(doc.lines(), id).ok_or(EditError::NotFound { id })?;
        check_line_scope(doc.lines(), idx, id.kind, session)?;

        let current = doc.lines()[idx].clone();
        let context = self.grounding_context(doc.lines(), id.kind);
        let section_text = find_section_span(doc.lines(), id.kind)
            .map(|span| doc.lines()[span.start..span.end].join("\n"))
            .unwrap_or_default();
        let ground_ctx = format!("{context}\n{section_text}");
        let request = prompt::update_prompt(id, &current, instruction, &context);
        let reminder = prompt::strict_reminder(id.kind, None);
        let min_keywords = self.config.min_shared_keywords;

        let validate = |candidates: &[String]| -> Result<Vec<String>, String> {
            let [line] = candidates else {
                return Err("expected exactly one revised line".to_string());
            };
            match entry_head(line) {
                Some((got, _)) if got == id => {}
                _ => return Err(format!("the revised line must start with '{id}:'")),
            }
            validate_lines(id.kind, std::slice::from_ref(line)).map_err(|e| e.to_string())?;
            validate_grounding(std::slice::from_ref(line), &ground_ctx, min_keywords)
                .map_err(|e| e.to_string())?;
            Ok(vec![line.clone()])
        };

        let lines = generate_validated(
            &self.generator,
            &request,
            &reminder,
            self.config.max_generation_attempts,
            validate,
        )
        .await
        .map_err(|e| map_loop_error(id.kind, e))?;

        doc.replace(idx, lines[0].clone());
        tracing::info!(%id, line = idx, "entry updated");
        let changes = vec![AppliedChange {
            section: id.kind.section().to_string(),
            range: idx..idx + 1,
            lines,
        }];
        self.finish(doc.to_text(), format!("Updated {id}."), changes, session)
            .await
    }

    async fn apply_delete(
        &self,
        text: &str,
        facts: InstructionFacts,
        session: EditSession,
    ) -> Result<EditOutcome, EditError> {
        let id = facts.explicit_id.ok_or(EditError::ExplicitIdRequired {
            kind: facts.kind.display_name(),
        })?;
        check_kind_scope(id.kind, session)?;

        let mut doc = DocText::from_text(text);
        let idx = find_entry_line(doc.lines(), id).ok_or(EditError::NotFound { id })?;
        check_line_scope(doc.lines(), idx, id.kind, session)?;

        doc.remove(idx);
        tracing::info!(%id, line = idx, "entry deleted");
        let message = format!("Deleted {id} from [{}].", id.kind.section());
        let changes = vec![AppliedChange {
            section: id.kind.section().to_string(),
            range: idx..idx,
            lines: Vec::new(),
        }];
        self.finish(doc.to_text(), message, changes, session).await
    }

    /// Shared tail of every successful mutation: renumber, remap references,
    /// derive coverage, optionally propose a repair.
    async fn finish(
        &self,
        text: String,
        message: String,
        changes: Vec<AppliedChange>,
        session: EditSession,
    ) -> Result<EditOutcome, EditError> {
        let normalized = normalize_document(&text, true);
        let doc = DocText::from_text(&normalized.text);
        let report = check_coverage(doc.lines());
        let repair_plan = if self.config.propose_repairs {
            self.propose_repair(doc.lines(), &report, session).await
        } else {
            None
        };
        Ok(EditOutcome {
            text: normalized.text,
            message,
            changes,
            report,
            repair_plan,
        })
    }

    /// Ask the generator for a repair plan covering the report's gaps.
    ///
    /// Best-effort: any backend, parse or validation failure is logged and
    /// swallowed, because the edit itself already succeeded. The returned
    /// plan has passed section and grammar validation but is only a
    /// proposal.
    async fn propose_repair(
        &self,
        lines: &[String],
        report: &CoverageReport,
        session: EditSession,
    ) -> Option<EditPlan> {
        let step = session.step();
        let unscoped = step.is_none();
        let (gaps, allowed, plan_step) =
            if report.has_step1_gaps() && (unscoped || step == Some(GuidedStep::Step1)) {
                let mut gaps = String::new();
                for id in &report.uncovered_losses {
                    gaps.push_str(&format!("{id} is not led to by any hazard\n"));
                }
                for id in &report.uncovered_hazards {
                    gaps.push_str(&format!("{id} is not addressed by any safety constraint\n"));
                }
                (
                    gaps,
                    vec!["HAZARDS", "SAFETY_CONSTRAINTS"],
                    GuidedStep::Step1,
                )
            } else if report.has_uca_gaps()
                && (unscoped
                    || matches!(step, Some(GuidedStep::Step2 | GuidedStep::Step3)))
            {
                let mut gaps = String::new();
                for id in &report.hazards_without_ucas {
                    gaps.push_str(&format!("{id} has no unsafe control action relating to it\n"));
                }
                (gaps, vec!["UCAS"], GuidedStep::Step3)
            } else {
                return None;
            };

        let context = self.grounding_context(lines, Kind::Hazard);
        let request = prompt::repair_prompt(&gaps, &allowed, &context);
        let raw = match self.generator.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "repair proposal generation failed");
                return None;
            }
        };
        let plan = match parse_repair_plan(&raw) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::warn!(%reason, "repair proposal unparseable");
                return None;
            }
        };
        let scope = PlanScope {
            step: Some(plan_step),
            allowed_sections: allowed,
        };
        match validate_plan(&plan, &scope, true) {
            Ok(()) => Some(plan),
            Err(e) => {
                tracing::warn!(error = %e, "repair proposal rejected");
                None
            }
        }
    }

    /// Context the grounding check runs against: the system description when
    /// present, otherwise the head of the document plus the lines preceding
    /// the target section.
    fn grounding_context(&self, lines: &[String], kind: Kind) -> String {
        if let Some(span) = find_tag_span(lines, SYSTEM_DESCRIPTION_TAG) {
            return lines[span.start..span.end].join("\n");
        }
        let head_end = self.config.fallback_head_lines.min(lines.len());
        let mut parts: Vec<&str> = lines[..head_end].iter().map(String::as_str).collect();
        if let Some(span) = find_section_span(lines, kind) {
            if span.heading > head_end {
                let from = span
                    .heading
                    .saturating_sub(self.config.fallback_context_lines)
                    .max(head_end);
                for line in &lines[from..span.heading] {
                    parts.push(line);
                }
            }
        }
        parts.join("\n")
    }
}

fn check_kind_scope(kind: Kind, session: EditSession) -> Result<(), EditError> {
    match session.step() {
        Some(step) if kind.step() != step => Err(EditError::ScopeViolation {
            section: kind.section().to_string(),
            step,
        }),
        _ => Ok(()),
    }
}

/// A scoped session also requires the target line to physically sit inside
/// the step's body, so a section misplaced under another step marker cannot
/// be edited through the wrong scope. An insertion index equal to the body's
/// end is still inside the step (right before the next marker).
fn check_line_scope(
    lines: &[String],
    idx: usize,
    kind: Kind,
    session: EditSession,
) -> Result<(), EditError> {
    check_scope_at(lines, idx, kind, session, false)
}

fn check_insert_scope(
    lines: &[String],
    idx: usize,
    kind: Kind,
    session: EditSession,
) -> Result<(), EditError> {
    check_scope_at(lines, idx, kind, session, true)
}

fn check_scope_at(
    lines: &[String],
    idx: usize,
    kind: Kind,
    session: EditSession,
    insertion: bool,
) -> Result<(), EditError> {
    let Some(step) = session.step() else {
        return Ok(());
    };
    let body =
        find_step_body(lines, step).ok_or(LocateError::StepMarkerMissing { step })?;
    let inside = body.contains(&idx) || (insertion && idx == body.end);
    if inside {
        Ok(())
    } else {
        Err(EditError::ScopeViolation {
            section: kind.section().to_string(),
            step,
        })
    }
}

fn map_loop_error(kind: Kind, err: GenerateLoopError) -> EditError {
    match err {
        GenerateLoopError::Generator(e) => EditError::Generator(e),
        GenerateLoopError::Rejected { reason, raw } => EditError::GenerationRejected {
            kind: kind.display_name(),
            reason,
            raw,
        },
    }
}
