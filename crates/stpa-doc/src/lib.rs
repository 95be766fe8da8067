//! STPA document model
//!
//! Operates on an analysis document as a line array:
//! - [`lines::DocText`] preserves newline flavor and trailing-newline presence
//! - [`locate`] finds section/step spans and synthesizes missing headings
//! - [`renumber`] allocates IDs and runs the idempotent renumbering pass
//! - [`coverage`] derives advisory cross-section consistency findings
//! - [`grounding`] checks that generated lines reuse existing vocabulary
//!
//! Everything is synchronous and pure apart from the explicit mutating
//! lookups on [`lines::DocText`].

pub mod coverage;
pub mod grounding;
pub mod lines;
pub mod locate;
pub mod renumber;

pub use coverage::{check_coverage, CoverageReport, DanglingRef};
pub use grounding::{entity_phrases, keywords, validate_grounding, GroundingError};
pub use lines::{DocText, Newline};
pub use locate::{
    ensure_section, find_entry_line, find_insert_line, find_section_span, find_step_body,
    find_tag_span, EnsuredSection, LocateError, SectionSpan,
};
pub use renumber::{next_free_id, normalize_document, renumber_step, Renumbered};
