//! Grounding validation
//!
//! Generated lines must reuse vocabulary or entities already present in the
//! document, so the assistant cannot invent an unrelated system. A candidate
//! line passes when it mentions an entity phrase extracted from the context,
//! or shares enough keywords with it. A context with nothing usable grounds
//! everything trivially.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Words ignored when extracting context keywords.
const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "because", "been", "before", "being", "below",
    "between", "both", "cannot", "could", "does", "doing", "down", "during", "each", "from",
    "further", "have", "having", "here", "into", "itself", "just", "more", "most", "must",
    "once", "only", "other", "over", "same", "shall", "should", "some", "such", "than", "that",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "under",
    "until", "very", "were", "what", "when", "where", "which", "while", "will", "with", "would",
];

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}_-]*").expect("word regex"));

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("quote regex"));

// Runs of capitalized, numeric or hyphenated tokens, e.g. `Door Controller`
// or `Train-2`.
static CAP_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\p{Lu}[\p{L}\p{N}-]*|\p{N}[\p{L}\p{N}-]*)(?:[ \t]+(?:\p{Lu}[\p{L}\p{N}-]*|\p{N}[\p{L}\p{N}-]*))*")
        .expect("capitalized run regex")
});

/// Lower-cased context keywords: words of at least four characters minus the
/// stop-word set.
#[must_use]
pub fn keywords(text: &str) -> HashSet<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() >= 4 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Entity phrases: quoted strings plus runs of capitalized/numeric tokens,
/// lower-cased, at least four characters long.
#[must_use]
pub fn entity_phrases(text: &str) -> Vec<String> {
    let mut phrases: Vec<String> = QUOTED_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .chain(CAP_RUN_RE.find_iter(text).filter_map(|m| {
            // Sentence-initial articles capitalize too; strip leading tokens
            // that carry no entity information.
            let mut tokens: Vec<&str> = m.as_str().split_whitespace().collect();
            while let Some(first) = tokens.first() {
                let lower = first.to_lowercase();
                if lower.chars().count() < 4 || STOP_WORDS.contains(&lower.as_str()) {
                    tokens.remove(0);
                } else {
                    break;
                }
            }
            if tokens.is_empty() {
                None
            } else {
                Some(tokens.join(" ").to_lowercase())
            }
        }))
        .filter(|p| p.chars().count() >= 4)
        .collect();
    phrases.sort();
    phrases.dedup();
    phrases
}

/// A generated line that does not reuse context vocabulary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("line is not grounded in the existing analysis context: {line:?}")]
pub struct GroundingError {
    /// The offending candidate line
    pub line: String,
}

/// Validate that every candidate line is grounded in `context` (the system
/// description plus the target section's current text).
///
/// A line passes when it contains at least one context entity phrase or
/// shares at least `min_shared_keywords` keywords with the context. When the
/// context contributes no keywords and no phrases there is nothing to ground
/// against and the batch passes.
pub fn validate_grounding<S: AsRef<str>>(
    candidates: &[S],
    context: &str,
    min_shared_keywords: usize,
) -> Result<(), GroundingError> {
    let ctx_keywords = keywords(context);
    let ctx_phrases = entity_phrases(context);
    if ctx_keywords.is_empty() && ctx_phrases.is_empty() {
        return Ok(());
    }
    for candidate in candidates {
        let line = candidate.as_ref();
        let lower = line.to_lowercase();
        if ctx_phrases.iter().any(|p| lower.contains(p.as_str())) {
            continue;
        }
        let shared = keywords(line)
            .intersection(&ctx_keywords)
            .count();
        if shared >= min_shared_keywords {
            continue;
        }
        return Err(GroundingError {
            line: line.to_string(),
        });
    }
    Ok(())
}
