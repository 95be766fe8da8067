//! Property tests for the renumbering normalizer.

use proptest::prelude::*;
use stpa_doc::{check_coverage, normalize_document, DocText};

/// Build a Step-1 document from arbitrary loss IDs and hazards whose
/// references may or may not resolve.
fn build_doc(loss_ids: &[u32], hazards: &[(u32, Vec<u32>)], crlf: bool) -> String {
    let mut out = String::from("## Step 1\n\n[LOSSES]\n");
    for id in loss_ids {
        out.push_str(&format!("L{id}: Loss number {id}.\n"));
    }
    out.push_str("\n[HAZARDS]\n");
    for (id, refs) in hazards {
        let list = refs
            .iter()
            .map(|r| format!("L{r}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("H{id}: Hazard number {id}. (leads_to: {list})\n"));
    }
    if crlf {
        out.replace('\n', "\r\n")
    } else {
        out
    }
}

fn unique_ids() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::btree_set(1u32..40, 1..6).prop_map(|s| s.into_iter().collect())
}

proptest! {
    #[test]
    fn normalization_stabilizes_after_one_pass(
        loss_ids in unique_ids(),
        hazard_ids in unique_ids(),
        refs in proptest::collection::vec(proptest::collection::vec(1u32..40, 1..4), 1..6),
        crlf in any::<bool>(),
    ) {
        let hazards: Vec<(u32, Vec<u32>)> = hazard_ids
            .iter()
            .zip(refs.iter())
            .map(|(id, r)| (*id, r.clone()))
            .collect();
        let text = build_doc(&loss_ids, &hazards, crlf);

        let once = normalize_document(&text, true);
        let twice = normalize_document(&once.text, true);
        prop_assert_eq!(&twice.text, &once.text);
        prop_assert!(!twice.changed);
    }

    #[test]
    fn every_reference_resolves_after_normalization(
        loss_ids in unique_ids(),
        hazard_ids in unique_ids(),
        refs in proptest::collection::vec(proptest::collection::vec(1u32..40, 1..4), 1..6),
    ) {
        let hazards: Vec<(u32, Vec<u32>)> = hazard_ids
            .iter()
            .zip(refs.iter())
            .map(|(id, r)| (*id, r.clone()))
            .collect();
        let text = build_doc(&loss_ids, &hazards, false);

        let normalized = normalize_document(&text, true);
        let doc = DocText::from_text(&normalized.text);
        let report = check_coverage(doc.lines());
        prop_assert!(report.dangling.is_empty(), "dangling refs survived: {:?}", report.dangling);
    }

    #[test]
    fn newline_conventions_survive_normalization(
        loss_ids in unique_ids(),
        crlf in any::<bool>(),
        trailing in any::<bool>(),
    ) {
        let mut text = build_doc(&loss_ids, &[], crlf);
        if !trailing {
            while text.ends_with('\n') || text.ends_with('\r') {
                text.pop();
            }
        }
        let normalized = normalize_document(&text, true);
        prop_assert_eq!(normalized.text.contains("\r\n"), crlf);
        let ends_nl = normalized.text.ends_with('\n');
        prop_assert_eq!(ends_nl, trailing);
    }
}
