//! Typed entry identifiers
//!
//! An [`EntryId`] is the `PREFIX<digits>` token that addresses one entry,
//! e.g. `H3` or `LOOP1`. Lexing is longest-prefix-first so `LS1`, `LOOP2`
//! and `L3` (or `CTRL1` and `CA2`) never mis-tokenize.

use crate::kind::Kind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Prefix alternation ordered longest-first; keep in sync with the registry.
pub(crate) const PREFIX_ALTERNATION: &str = "CTRL|PROC|LOOP|UCA|ACT|SEN|EXT|SC|RH|CA|FB|LS|L|H";

static ID_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({PREFIX_ALTERNATION})(\d+)\b")).expect("id token regex")
});

static ID_EXACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^({PREFIX_ALTERNATION})(\d+)$")).expect("id exact regex")
});

/// Regex matching any ID token (`H3`, `LOOP1`, ...) inside free text.
#[inline]
#[must_use]
pub fn id_token_regex() -> &'static Regex {
    &ID_TOKEN_RE
}

/// A typed entry identifier: kind plus numeric suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId {
    /// The entity kind the prefix denotes
    pub kind: Kind,
    /// Numeric suffix (1-based)
    pub num: u32,
}

impl EntryId {
    /// Create a new entry ID.
    #[inline]
    #[must_use]
    pub fn new(kind: Kind, num: u32) -> Self {
        Self { kind, num }
    }

    /// Scan free text for every ID token, left to right.
    #[must_use]
    pub fn scan(text: &str) -> Vec<EntryId> {
        ID_TOKEN_RE
            .captures_iter(text)
            .filter_map(|c| {
                let kind = Kind::from_prefix(c.get(1)?.as_str())?;
                let num = c.get(2)?.as_str().parse().ok()?;
                Some(EntryId { kind, num })
            })
            .collect()
    }

    /// First ID token present in free text, if any.
    #[must_use]
    pub fn first_in(text: &str) -> Option<EntryId> {
        ID_TOKEN_RE.captures(text).and_then(|c| {
            let kind = Kind::from_prefix(c.get(1)?.as_str())?;
            let num = c.get(2)?.as_str().parse().ok()?;
            Some(EntryId { kind, num })
        })
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind.id_prefix(), self.num)
    }
}

/// Error parsing an ID token.
#[derive(Debug, Clone, thiserror::Error)]
#[error("not a recognized entry ID: {0}")]
pub struct ParseIdError(pub String);

impl FromStr for EntryId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ID_EXACT_RE
            .captures(s.trim())
            .ok_or_else(|| ParseIdError(s.to_string()))?;
        let kind = Kind::from_prefix(&caps[1]).ok_or_else(|| ParseIdError(s.to_string()))?;
        let num = caps[2].parse().map_err(|_| ParseIdError(s.to_string()))?;
        Ok(EntryId { kind, num })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_round_trips() {
        let id = EntryId::new(Kind::Hazard, 3);
        assert_eq!(id.to_string(), "H3");
        assert_eq!("H3".parse::<EntryId>().unwrap(), id);
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!("LS1".parse::<EntryId>().unwrap().kind, Kind::LossScenario);
        assert_eq!("LOOP2".parse::<EntryId>().unwrap().kind, Kind::ControlLoop);
        assert_eq!("L3".parse::<EntryId>().unwrap().kind, Kind::Loss);
        assert_eq!("CTRL1".parse::<EntryId>().unwrap().kind, Kind::Controller);
        assert_eq!("CA2".parse::<EntryId>().unwrap().kind, Kind::ControlAction);
        assert_eq!("SC4".parse::<EntryId>().unwrap().kind, Kind::SafetyConstraint);
        assert_eq!("SEN1".parse::<EntryId>().unwrap().kind, Kind::Sensor);
    }

    #[test]
    fn scan_finds_ids_in_order() {
        let ids = EntryId::scan("H2: brakes fail. (leads_to: L1, L3)");
        assert_eq!(
            ids,
            vec![
                EntryId::new(Kind::Hazard, 2),
                EntryId::new(Kind::Loss, 1),
                EntryId::new(Kind::Loss, 3),
            ]
        );
    }

    #[test]
    fn scan_does_not_split_tokens() {
        // The H inside RH1 is not a hazard reference.
        let ids = EntryId::scan("RH1: narrowed case. (refines: H2)");
        assert_eq!(
            ids,
            vec![
                EntryId::new(Kind::RefinedHazard, 1),
                EntryId::new(Kind::Hazard, 2),
            ]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("X1".parse::<EntryId>().is_err());
        assert!("H".parse::<EntryId>().is_err());
        assert!("3H".parse::<EntryId>().is_err());
    }

    proptest! {
        #[test]
        fn any_id_round_trips(kind_idx in 0usize..14, num in 1u32..10_000) {
            let id = EntryId::new(Kind::ALL[kind_idx], num);
            let parsed: EntryId = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }
}
