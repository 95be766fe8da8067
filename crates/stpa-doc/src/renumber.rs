//! ID allocation and renumbering
//!
//! The renumbering pass reassigns contiguous IDs per section in a fixed kind
//! order and rewrites every reference that pointed at an old ID. References
//! that no longer resolve are dropped, never left stale. The pass is
//! idempotent and preserves the document's newline conventions exactly.

use crate::lines::DocText;
use crate::locate::find_section_span;
use indexmap::IndexMap;
use stpa_schema::{
    entry_head, entry_regex, id_token_regex, relation_block_span, EntryId, GuidedStep, Kind,
};

/// Next free numeric suffix for `kind`: max over all matching lines plus one,
/// or 1 when the document holds no entry of the kind.
#[must_use]
pub fn next_free_id(lines: &[String], kind: Kind) -> u32 {
    let re = entry_regex(kind);
    lines
        .iter()
        .filter_map(|l| re.captures(l)?.get(1)?.as_str().parse::<u32>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

/// Result of a renumbering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renumbered {
    /// The resulting document text
    pub text: String,
    /// True when the pass changed anything
    pub changed: bool,
}

/// Renumber the sections owned by one guided step.
///
/// When `renumber` is false, IDs are left as-is but relation references to
/// the step's kinds are still remapped (which drops dangling ones).
#[must_use]
pub fn renumber_step(text: &str, step: GuidedStep, renumber: bool) -> Renumbered {
    let mut doc = DocText::from_text(text);
    renumber_kinds(&mut doc, step.kinds(), renumber);
    let out = doc.to_text();
    Renumbered {
        changed: out != text,
        text: out,
    }
}

/// Renumber all four steps in order. This is the whole-document
/// normalization run after every successful edit.
#[must_use]
pub fn normalize_document(text: &str, renumber: bool) -> Renumbered {
    let mut doc = DocText::from_text(text);
    for step in GuidedStep::ALL {
        renumber_kinds(&mut doc, step.kinds(), renumber);
    }
    let out = doc.to_text();
    Renumbered {
        changed: out != text,
        text: out,
    }
}

fn renumber_kinds(doc: &mut DocText, kinds: &[Kind], renumber: bool) {
    // Pass 1: walk each kind's section top to bottom, assign contiguous IDs
    // and record the old -> new map. Only entry heads are rewritten here;
    // references still carry the old IDs and are remapped in pass 2.
    let mut map: IndexMap<EntryId, u32> = IndexMap::new();
    for &kind in kinds {
        let Some(span) = find_section_span(doc.lines(), kind) else {
            continue;
        };
        let re = entry_regex(kind);
        let mut next = 1u32;
        for idx in span.start..span.end {
            let Some(digits) = re.captures(&doc.lines()[idx]).and_then(|c| c.get(1)) else {
                continue;
            };
            let old: u32 = match digits.as_str().parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let new = if renumber { next } else { old };
            next += 1;
            let (digit_start, digit_end) = (digits.start(), digits.end());
            map.insert(EntryId::new(kind, old), new);
            if new != old {
                let line = &doc.lines()[idx];
                let rewritten =
                    format!("{}{}{}", &line[..digit_start], new, &line[digit_end..]);
                doc.replace(idx, rewritten);
            }
        }
    }

    // Pass 2: remap references to the renumbered kinds everywhere in the
    // document. Inside a relation parenthetical an unresolvable reference is
    // dropped; a body mention (e.g. CTRL1 inside a loop description) is
    // remapped when possible and otherwise left alone.
    for idx in 0..doc.len() {
        let line = doc.lines()[idx].clone();
        let rewritten = rewrite_references(&line, &map, kinds);
        if rewritten != line {
            doc.replace(idx, rewritten);
        }
    }
}

fn rewrite_references(line: &str, map: &IndexMap<EntryId, u32>, kinds: &[Kind]) -> String {
    let Some((_, head_end)) = entry_head(line) else {
        return line.to_string();
    };
    let mut out = String::with_capacity(line.len());
    out.push_str(&line[..head_end]);
    match relation_block_span(line) {
        None => out.push_str(&remap_tokens(&line[head_end..], map, kinds)),
        Some(block) => {
            out.push_str(&remap_tokens(&line[head_end..block.start], map, kinds));
            match rebuild_relation_block(&line[block.clone()], map, kinds) {
                Some(new_block) => {
                    out.push_str(&new_block);
                    out.push_str(&line[block.end..]);
                }
                None => {
                    // Every reference was dropped; remove the parenthetical.
                    out.push_str(&line[block.end..]);
                    let trimmed = out.trim_end().to_string();
                    out = trimmed;
                }
            }
        }
    }
    out
}

/// Remap ID tokens in free text, keeping tokens that do not resolve.
fn remap_tokens(text: &str, map: &IndexMap<EntryId, u32>, kinds: &[Kind]) -> String {
    id_token_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let token = caps.get(0).map_or("", |m| m.as_str());
            match token.parse::<EntryId>() {
                Ok(id) if kinds.contains(&id.kind) => match map.get(&id) {
                    Some(new) => format!("{}{new}", id.kind.id_prefix()),
                    None => token.to_string(),
                },
                _ => token.to_string(),
            }
        })
        .into_owned()
}

/// Rebuild a relation parenthetical, remapping references and dropping the
/// ones that no longer resolve. Returns `None` when nothing survives.
fn rebuild_relation_block(
    block: &str,
    map: &IndexMap<EntryId, u32>,
    kinds: &[Kind],
) -> Option<String> {
    let inner = block.strip_prefix('(')?.strip_suffix(')')?;
    let mut clauses = Vec::new();
    for clause in inner.split(';') {
        let Some((name, list)) = clause.split_once(':') else {
            let kept = clause.trim();
            if !kept.is_empty() {
                clauses.push(kept.to_string());
            }
            continue;
        };
        let mut ids = Vec::new();
        for caps in id_token_regex().captures_iter(list) {
            let token = caps.get(0).map_or("", |m| m.as_str());
            let Ok(id) = token.parse::<EntryId>() else {
                continue;
            };
            if kinds.contains(&id.kind) {
                if let Some(new) = map.get(&id) {
                    ids.push(format!("{}{new}", id.kind.id_prefix()));
                }
                // else: dangling, dropped
            } else {
                ids.push(token.to_string());
            }
        }
        if !ids.is_empty() {
            clauses.push(format!("{}: {}", name.trim(), ids.join(", ")));
        }
    }
    if clauses.is_empty() {
        None
    } else {
        Some(format!("({})", clauses.join("; ")))
    }
}
