//! Error taxonomy for the smart-edit engine
//!
//! All variants are local, user-recoverable conditions: the engine refuses
//! to mutate the document and reports why, it never panics on bad input.

use crate::generator::GeneratorError;
use stpa_doc::LocateError;
use stpa_schema::{EntryId, GuidedStep};

/// Everything that can stop an edit.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The instruction names no recognizable entity kind.
    #[error("could not determine which kind of entry the instruction refers to: {0:?}")]
    KindUnresolved(String),

    /// The operation needs an explicit ID (delete/update always; adding a
    /// refined hazard needs the hazard being refined).
    #[error("an explicit {kind} ID is required for this operation")]
    ExplicitIdRequired {
        /// Human-readable kind name
        kind: &'static str,
    },

    /// The delete/update target does not exist. Not retried: a missing ID
    /// stays missing.
    #[error("could not find {id} in the document")]
    NotFound {
        /// The absent entry
        id: EntryId,
    },

    /// The edit targets a section outside the active guided step.
    #[error("section {section} is outside the sections allowed in {step}")]
    ScopeViolation {
        /// Canonical tag of the offending section
        section: String,
        /// The active step
        step: GuidedStep,
    },

    /// Section/step location failure (missing step marker).
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// Generated content failed grammar or grounding validation after all
    /// attempts. Carries the raw output so the caller can show it.
    #[error("generated {kind} content failed validation: {reason}")]
    GenerationRejected {
        /// Human-readable kind name
        kind: &'static str,
        /// Why the last attempt was rejected
        reason: String,
        /// Raw output of the last attempt, unvalidated
        raw: String,
    },

    /// The external text generator itself failed.
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// An edit plan failed validation; nothing was applied.
    #[error("edit plan rejected: {0}")]
    PlanRejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use stpa_schema::Kind;

    #[test]
    fn not_found_names_the_id() {
        let err = EditError::NotFound {
            id: EntryId::new(Kind::SafetyConstraint, 1),
        };
        assert_eq!(err.to_string(), "could not find SC1 in the document");
    }

    #[test]
    fn scope_violation_names_section_and_step() {
        let err = EditError::ScopeViolation {
            section: "UCAS".to_string(),
            step: GuidedStep::Step1,
        };
        let msg = err.to_string();
        assert!(msg.contains("UCAS"));
        assert!(msg.contains("Step 1"));
    }
}
