//! End-to-end tests of the smart-edit engine against scripted generators.

use pretty_assertions::assert_eq;
use stpa_edit::{
    ActionOp, EditAction, EditError, EditOp, EditPlan, EditSession, EngineConfig, SmartEditEngine,
};
use stpa_schema::GuidedStep;
use stpa_test_utils::{init_tracing, FailingGenerator, ScriptedGenerator, GAPPY_STEP1_DOC, TRAIN_DOC};

fn engine(responses: &[&str]) -> SmartEditEngine<ScriptedGenerator> {
    init_tracing();
    SmartEditEngine::with_config(
        ScriptedGenerator::new(responses.iter().copied()),
        EngineConfig::new().with_repair_proposals(false),
    )
}

#[tokio::test]
async fn add_hazard_assigns_next_free_id() {
    let engine = engine(&["The train stops misaligned with the platform doors. (leads_to: L1)"]);
    let outcome = engine
        .apply_instruction(
            TRAIN_DOC,
            "Add a hazard about the train stopping outside the platform area",
            EditSession::unscoped(),
        )
        .await
        .unwrap();
    assert!(outcome
        .text
        .contains("H3: The train stops misaligned with the platform doors. (leads_to: L1)"));
    assert_eq!(outcome.message, "Added H3 to [HAZARDS].");
    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.changes[0].section, "HAZARDS");
    assert_eq!(engine.generator().calls(), 1);
}

#[tokio::test]
async fn add_tolerates_generator_supplied_ids() {
    // The generator was told not to number entries; a stray head of the
    // right kind is stripped and replaced by the engine's own ID.
    let engine = engine(&["H9: Platform doors release while the train is moving. (leads_to: L1)"]);
    let outcome = engine
        .apply_instruction(TRAIN_DOC, "add a hazard about the doors", EditSession::unscoped())
        .await
        .unwrap();
    assert!(outcome.text.contains("H3: Platform doors release"));
    assert!(!outcome.text.contains("H9:"));
}

#[tokio::test]
async fn add_with_explicit_id_targets_that_kinds_section() {
    // An ID in the instruction determines the kind, keywords do not override
    // it: "a hazard for L1" is an edit about L1 and lands in [LOSSES].
    let engine = engine(&["Loss of service when the train is stopped by a door fault."]);
    let outcome = engine
        .apply_instruction(TRAIN_DOC, "add a hazard for L1", EditSession::unscoped())
        .await
        .unwrap();
    assert_eq!(outcome.message, "Added L3 to [LOSSES].");
    assert!(outcome
        .text
        .contains("L3: Loss of service when the train is stopped by a door fault."));
}

#[tokio::test]
async fn update_rewrites_one_line_in_place() {
    let engine = engine(&[
        "H2: Train exceeds the safe speed limit and braking is unavailable. (leads_to: L1, L2)",
    ]);
    let outcome = engine
        .apply_instruction(
            TRAIN_DOC,
            "update H2 to also mention unavailable braking",
            EditSession::unscoped(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.message, "Updated H2.");
    assert!(outcome.text.contains("braking is unavailable"));
    assert!(!outcome.text.contains("for the track segment"));
    // Only that line changed.
    assert!(outcome.text.contains("H1: Train doors are open"));
}

#[tokio::test]
async fn update_of_missing_entry_is_not_retried() {
    let engine = engine(&[]);
    let err = engine
        .apply_instruction(TRAIN_DOC, "update SC9 to cover both hazards", EditSession::unscoped())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "could not find SC9 in the document");
    assert_eq!(engine.generator().calls(), 0);
}

#[tokio::test]
async fn delete_renumbers_and_remaps_references() {
    let engine = engine(&[]);
    let outcome = engine
        .apply_instruction(TRAIN_DOC, "delete H1", EditSession::unscoped())
        .await
        .unwrap();
    assert_eq!(outcome.message, "Deleted H1 from [HAZARDS].");
    // The surviving hazard takes the freed number and references follow.
    assert!(outcome.text.contains("H1: Train exceeds the safe speed limit"));
    assert!(!outcome.text.contains("H2:"));
    assert!(outcome
        .text
        .contains("SC2: The train must never exceed the segment speed limit. (addresses: H1)"));
    // The reference to the deleted hazard is dropped, not left dangling.
    assert!(outcome
        .text
        .contains("SC1: Doors must remain closed whenever the train is in motion."));
    assert!(outcome.report.dangling.is_empty());
}

#[tokio::test]
async fn rejected_attempt_retries_with_stricter_prompt() {
    let engine = engine(&[
        "A hazard description missing its relation block",
        "Doors open while the train moves between stations. (leads_to: L1)",
    ]);
    let outcome = engine
        .apply_instruction(TRAIN_DOC, "add a hazard about doors", EditSession::unscoped())
        .await
        .unwrap();
    assert!(outcome.text.contains("H3: Doors open while the train moves"));
    assert_eq!(engine.generator().calls(), 2);
    let prompts = engine.generator().prompts();
    assert!(!prompts[0].contains("rejected"));
    assert!(prompts[1].contains("rejected"));
}

#[tokio::test]
async fn exhausted_retries_leave_the_document_alone() {
    let engine = engine(&[
        "still not a valid hazard line",
        "and neither is this one",
    ]);
    let err = engine
        .apply_instruction(TRAIN_DOC, "add a hazard about doors", EditSession::unscoped())
        .await
        .unwrap_err();
    match err {
        EditError::GenerationRejected { kind, raw, .. } => {
            assert_eq!(kind, "hazard");
            assert_eq!(raw, "and neither is this one");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.generator().calls(), 2);
}

#[tokio::test]
async fn ungrounded_content_is_rejected() {
    let engine = engine(&[
        "The submarine ballast tanks flood catastrophically underwater. (leads_to: L1)",
        "The submarine ballast tanks flood catastrophically underwater. (leads_to: L1)",
    ]);
    let err = engine
        .apply_instruction(TRAIN_DOC, "add a hazard", EditSession::unscoped())
        .await
        .unwrap_err();
    match err {
        EditError::GenerationRejected { reason, .. } => {
            assert!(reason.contains("not grounded"), "reason: {reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn refined_hazard_requires_an_anchor() {
    let engine = engine(&[]);
    let err = engine
        .apply_instruction(TRAIN_DOC, "add a refined hazard", EditSession::unscoped())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EditError::ExplicitIdRequired { kind: "hazard" }
    ));
    assert_eq!(engine.generator().calls(), 0);
}

#[tokio::test]
async fn refinement_synthesizes_the_section_and_pins_the_anchor() {
    let engine =
        engine(&["Doors open above walking speed while the train moves. (refines: H1)"]);
    let outcome = engine
        .apply_instruction(
            TRAIN_DOC,
            "refine hazard H1 for the high speed case",
            EditSession::unscoped(),
        )
        .await
        .unwrap();
    assert!(outcome.text.contains("[REFINED_HAZARDS]"));
    assert!(outcome.text.contains("RH1: Doors open above walking speed"));
    // Synthesized inside Step 1, before the Step 2 marker.
    let rh_pos = outcome.text.find("[REFINED_HAZARDS]").unwrap();
    let step2_pos = outcome.text.find("## Step 2").unwrap();
    assert!(rh_pos < step2_pos);
}

#[tokio::test]
async fn refinement_of_missing_hazard_fails_fast() {
    let engine = engine(&[]);
    let err = engine
        .apply_instruction(TRAIN_DOC, "refine hazard H9", EditSession::unscoped())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "could not find H9 in the document");
}

#[tokio::test]
async fn scoped_session_rejects_other_steps() {
    let engine = engine(&[]);
    let err = engine
        .apply_instruction(
            TRAIN_DOC,
            "add an unsafe control action about early door release",
            EditSession::scoped(GuidedStep::Step1),
        )
        .await
        .unwrap_err();
    match err {
        EditError::ScopeViolation { section, step } => {
            assert_eq!(section, "UCAS");
            assert_eq!(step, GuidedStep::Step1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.generator().calls(), 0);

    let err = engine
        .apply_instruction(TRAIN_DOC, "delete UCA1", EditSession::scoped(GuidedStep::Step1))
        .await
        .unwrap_err();
    assert!(matches!(err, EditError::ScopeViolation { .. }));
}

#[tokio::test]
async fn unresolvable_instruction_is_rejected() {
    let engine = engine(&[]);
    let err = engine
        .apply_instruction(TRAIN_DOC, "make it nicer please", EditSession::unscoped())
        .await
        .unwrap_err();
    assert!(matches!(err, EditError::KindUnresolved(_)));
}

#[tokio::test]
async fn backend_outage_surfaces_as_generator_error() {
    init_tracing();
    let engine = SmartEditEngine::with_config(
        FailingGenerator,
        EngineConfig::new().with_repair_proposals(false),
    );
    let err = engine
        .apply_instruction(TRAIN_DOC, "add a hazard about doors", EditSession::unscoped())
        .await
        .unwrap_err();
    assert!(matches!(err, EditError::Generator(_)));
}

#[tokio::test]
async fn coverage_gaps_yield_a_validated_repair_proposal() {
    init_tracing();
    let plan_json = r#"{"title": "Cover L2", "summary": "Add a hazard leading to L2.",
        "actions": [{"op": "add", "section": "HAZARDS",
        "lines": ["A stalled train blocks the line and strands passengers. (leads_to: L2)"],
        "note": "covers the service loss"}]}"#;
    let engine = SmartEditEngine::new(ScriptedGenerator::new([
        "Platform doors must stay closed while the train is moving. (addresses: H1)",
        plan_json,
    ]));
    let outcome = engine
        .apply_instruction(
            GAPPY_STEP1_DOC,
            "add a safety constraint about keeping the doors closed",
            EditSession::unscoped(),
        )
        .await
        .unwrap();
    assert!(outcome.text.contains("SC1: Platform doors must stay closed"));
    // L2 is still uncovered, so a repair was proposed but not applied.
    assert!(outcome.report.has_step1_gaps());
    let plan = outcome.repair_plan.expect("expected a repair proposal");
    assert_eq!(plan.title, "Cover L2");
    assert!(!outcome.text.contains("stalled train"));
    assert_eq!(engine.generator().calls(), 2);
}

#[tokio::test]
async fn malformed_repair_proposal_is_discarded() {
    init_tracing();
    let engine = SmartEditEngine::new(ScriptedGenerator::new([
        "Platform doors must stay closed while the train is moving. (addresses: H1)",
        "I would add some hazards but cannot express them as JSON.",
    ]));
    let outcome = engine
        .apply_instruction(
            GAPPY_STEP1_DOC,
            "add a safety constraint about keeping the doors closed",
            EditSession::unscoped(),
        )
        .await
        .unwrap();
    assert!(outcome.repair_plan.is_none());
    assert!(outcome.text.contains("SC1:"));
}

#[tokio::test]
async fn repair_proposal_outside_allowed_sections_is_discarded() {
    init_tracing();
    let plan_json = r#"{"title": "Sneaky", "actions": [{"op": "add", "section": "UCAS",
        "lines": ["Door release while moving. (control loop: LOOP1; related: H1)"]}]}"#;
    let engine = SmartEditEngine::new(ScriptedGenerator::new([
        "Platform doors must stay closed while the train is moving. (addresses: H1)",
        plan_json,
    ]));
    let outcome = engine
        .apply_instruction(
            GAPPY_STEP1_DOC,
            "add a safety constraint about keeping the doors closed",
            EditSession::unscoped(),
        )
        .await
        .unwrap();
    assert!(outcome.repair_plan.is_none());
}

#[tokio::test]
async fn uca_gaps_propose_repairs_from_step2_sessions() {
    init_tracing();
    // A hazard with no UCA relating to it is reported from Step-2 sessions
    // too, so the guided flow can surface the proposal before Step 3 opens.
    const STEP2_DOC: &str = "\
[SYSTEM_DESCRIPTION]
An automated metro train with platform doors and speed sensors.

## Step 1

[LOSSES]
L1: Loss of passenger life.

[HAZARDS]
H1: Train doors are open while the train is moving. (leads_to: L1)

[SAFETY_CONSTRAINTS]
SC1: Doors must remain closed whenever the train is in motion. (addresses: H1)

## Step 2

[SENSORS]
SEN1: Speed sensor.

## Step 3

[UCAS]
";
    let plan_json = r#"{"title": "Relate H1 to an unsafe control action",
        "actions": [{"op": "add", "section": "UCAS",
        "lines": ["Door release is provided while the train is moving. (control loop: LOOP1; related: H1)"]}]}"#;
    let engine = SmartEditEngine::new(ScriptedGenerator::new([
        "Door position sensor on each train door.",
        plan_json,
    ]));
    let outcome = engine
        .apply_instruction(
            STEP2_DOC,
            "add a sensor for the door position",
            EditSession::scoped(GuidedStep::Step2),
        )
        .await
        .unwrap();
    assert!(outcome.text.contains("SEN2: Door position sensor"));
    let plan = outcome.repair_plan.expect("expected a repair proposal");
    assert!(plan.id.starts_with("plan-"));
    assert_eq!(plan.actions.len(), 1);
    // Proposed, never applied.
    assert!(!outcome.text.contains("Door release is provided"));
    assert_eq!(engine.generator().calls(), 2);
}

#[tokio::test]
async fn explicit_plans_apply_all_or_nothing() {
    let engine = engine(&[]);
    let plan = EditPlan {
        id: "plan-test-1".to_string(),
        title: "Add a loss".to_string(),
        summary: String::new(),
        actions: vec![EditAction {
            section: "LOSSES".to_string(),
            op: ActionOp::Add {
                lines: vec!["Loss of public confidence in the metro system.".to_string()],
            },
            note: None,
        }],
    };
    let outcome = engine
        .apply_edit_plan(TRAIN_DOC, &plan, EditSession::unscoped())
        .await
        .unwrap();
    assert!(outcome
        .text
        .contains("L3: Loss of public confidence in the metro system."));
    assert!(outcome.message.contains("Add a loss"));

    let bad = EditPlan {
        id: "plan-test-2".to_string(),
        title: "Bad".to_string(),
        summary: String::new(),
        actions: vec![EditAction {
            section: "LOSSES".to_string(),
            op: ActionOp::Delete {
                matches: "no such loss text".to_string(),
            },
            note: None,
        }],
    };
    let err = engine
        .apply_edit_plan(TRAIN_DOC, &bad, EditSession::unscoped())
        .await
        .unwrap_err();
    assert!(matches!(err, EditError::PlanRejected(_)));
}

#[tokio::test]
async fn hebrew_instructions_are_understood() {
    let engine = engine(&["Train doors open between stations while moving. (leads_to: L1)"]);
    let facts = stpa_edit::infer("הוסף סיכון על דלתות הרכבת").unwrap();
    assert_eq!(facts.op, EditOp::Add);
    let outcome = engine
        .apply_instruction(TRAIN_DOC, "הוסף סיכון על דלתות הרכבת", EditSession::unscoped())
        .await
        .unwrap();
    assert!(outcome.text.contains("H3: Train doors open between stations"));
}

#[tokio::test]
async fn review_reports_without_editing() {
    let engine = engine(&[]);
    let report = engine.review(GAPPY_STEP1_DOC);
    assert!(report.has_step1_gaps());
    assert!(report.uncovered_losses.iter().any(|id| id.to_string() == "L2"));
    assert_eq!(engine.generator().calls(), 0);
}
