//! Smart-edit engine for structured safety-analysis documents
//!
//! The engine turns a free-form instruction into a validated mutation of a
//! plain-text analysis document:
//! - [`instruction`] infers kind, operation and target from the wording
//! - [`prompt`] states the per-kind line contract the generator must meet
//! - [`generator`] wraps the fallible text backend behind [`TextGenerator`]
//!   and runs the bounded generate/validate/retry loop
//! - [`plan`] parses and applies section-scoped edit plans
//! - [`orchestrator`] ties it together and renumbers after every edit
//!
//! The document is the single source of truth: the engine keeps no state
//! between calls and never mutates the input on a failed validation.

pub mod config;
pub mod error;
pub mod generator;
pub mod instruction;
pub mod orchestrator;
pub mod plan;
pub mod prompt;

pub use config::EngineConfig;
pub use error::EditError;
pub use generator::{
    candidate_lines, generate_validated, GenerateLoopError, GeneratorError, TextGenerator,
};
pub use instruction::{infer, EditOp, InstructionFacts};
pub use orchestrator::{EditOutcome, EditSession, SmartEditEngine};
pub use plan::{
    apply_plan, parse_repair_plan, validate_plan, ActionOp, AppliedChange, EditAction, EditPlan,
    PlanScope,
};
