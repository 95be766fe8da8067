//! Cross-section consistency checking
//!
//! Coverage maps are derived from the current text on every call and never
//! persisted, so they cannot go stale. Findings are advisory: they feed the
//! repair-plan proposal but never block an edit.

use crate::locate::find_section_span;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use stpa_schema::{entry_regex, parse_relations, EntryId, Kind};

/// A relation reference whose target does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DanglingRef {
    /// The referring entry
    pub from: EntryId,
    /// The missing target
    pub to: EntryId,
}

/// Advisory consistency findings over one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageReport {
    /// Losses no hazard leads to
    pub uncovered_losses: Vec<EntryId>,
    /// Hazards no safety constraint addresses
    pub uncovered_hazards: Vec<EntryId>,
    /// Hazards no UCA relates to
    pub hazards_without_ucas: Vec<EntryId>,
    /// References pointing at entries that do not exist
    pub dangling: Vec<DanglingRef>,
}

impl CoverageReport {
    /// True when losses lack hazards or hazards lack constraints.
    #[inline]
    #[must_use]
    pub fn has_step1_gaps(&self) -> bool {
        !self.uncovered_losses.is_empty() || !self.uncovered_hazards.is_empty()
    }

    /// True when some hazard has no UCA relating to it.
    #[inline]
    #[must_use]
    pub fn has_uca_gaps(&self) -> bool {
        !self.hazards_without_ucas.is_empty()
    }

    /// True when nothing was flagged.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.uncovered_losses.is_empty()
            && self.uncovered_hazards.is_empty()
            && self.hazards_without_ucas.is_empty()
            && self.dangling.is_empty()
    }
}

/// Scan the document and derive the coverage report.
#[must_use]
pub fn check_coverage(lines: &[String]) -> CoverageReport {
    // Entries and their relations, per kind, in section order.
    let mut entries: HashMap<Kind, Vec<(EntryId, Vec<EntryId>)>> = HashMap::new();
    let mut existing: HashSet<EntryId> = HashSet::new();
    for kind in Kind::ALL {
        let Some(span) = find_section_span(lines, kind) else {
            continue;
        };
        let re = entry_regex(kind);
        let mut found = Vec::new();
        for line in &lines[span.start..span.end] {
            let Some(num) = re
                .captures(line)
                .and_then(|c| c.get(1)?.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            let id = EntryId::new(kind, num);
            existing.insert(id);
            found.push((id, parse_relations(kind, line)));
        }
        entries.insert(kind, found);
    }

    // target -> referrer count, rebuilt per call.
    let mut referrers: HashMap<EntryId, usize> = HashMap::new();
    let mut dangling = Vec::new();
    for kind in Kind::ALL {
        for (from, relations) in entries.get(&kind).map_or(&[][..], Vec::as_slice) {
            for &to in relations {
                if existing.contains(&to) {
                    *referrers.entry(to).or_insert(0) += 1;
                } else {
                    dangling.push(DanglingRef { from: *from, to });
                }
            }
        }
    }

    let covered_by = |target: EntryId, by: Kind| {
        entries
            .get(&by)
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .any(|(_, rels)| rels.contains(&target))
    };

    let ids_of = |kind: Kind| {
        entries
            .get(&kind)
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .map(|(id, _)| *id)
    };

    CoverageReport {
        uncovered_losses: ids_of(Kind::Loss)
            .filter(|id| referrers.get(id).copied().unwrap_or(0) == 0)
            .collect(),
        uncovered_hazards: ids_of(Kind::Hazard)
            .filter(|id| !covered_by(*id, Kind::SafetyConstraint))
            .collect(),
        hazards_without_ucas: ids_of(Kind::Hazard)
            .filter(|id| !covered_by(*id, Kind::Uca))
            .collect(),
        dangling,
    }
}
