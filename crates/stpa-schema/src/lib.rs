//! STPA schema registry
//!
//! Static knowledge about analysis documents:
//! - Entity [`Kind`]s with section tags, ID prefixes and numbering policy
//! - [`GuidedStep`]s grouping sections into the four analysis stages
//! - Typed [`EntryId`] tokens with longest-prefix lexing
//! - Per-kind line contracts and the heading grammar
//!
//! Everything here is pure and total; the document and edit layers build on
//! top of it.

pub mod grammar;
pub mod ids;
pub mod kind;

pub use grammar::{
    entry_head, entry_regex, heading_label, heading_matches, is_any_heading,
    is_system_description_heading, parse_relations, relation_block_span, relation_target_kinds,
    step_marker, validate_lines, GrammarError, SYSTEM_DESCRIPTION_TAG,
};
pub use ids::{id_token_regex, EntryId, ParseIdError};
pub use kind::{GuidedStep, Kind, KindMeta};
