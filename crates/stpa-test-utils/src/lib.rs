//! Testing utilities for the STPA smart-edit workspace
//!
//! Shared fixtures and scripted generators.

#![allow(missing_docs)]

use async_trait::async_trait;
use std::sync::Mutex;
use stpa_edit::{GeneratorError, TextGenerator};

/// A small but fully populated four-step analysis of an automated metro
/// train. Every relation resolves and IDs are contiguous.
pub const TRAIN_DOC: &str = "\
[SYSTEM_DESCRIPTION]
An automated metro train operates without a driver. The Automatic Train
Operation controller commands traction and braking of the train, and the
door controller releases the platform doors only when the train is stopped
and aligned. Speed sensors report motion to both controllers.

## Step 1 Fundamentals

[LOSSES]
L1: Loss of passenger life or serious injury.
L2: Loss of the train or major equipment damage.

[HAZARDS]
H1: Train doors are open while the train is moving. (leads_to: L1)
H2: Train exceeds the safe speed limit for the track segment. (leads_to: L1, L2)

[SAFETY_CONSTRAINTS]
SC1: Doors must remain closed whenever the train is in motion. (addresses: H1)
SC2: The train must never exceed the segment speed limit. (addresses: H2)

## Step 2 Control structure

[CONTROLLERS]
CTRL1: Automatic Train Operation controller.
CTRL2: Door controller.

[CONTROLLED_PROCESSES]
PROC1: Train traction and braking.
PROC2: Door mechanism.

[CONTROL_ACTIONS]
CA1: Apply service brake.
CA2: Release door locks.

[FEEDBACK]
FB1: Measured train speed.
FB2: Door closed status.

[CONTROL_LOOPS]
LOOP1: CTRL1 issues CA1 to PROC1 using FB1 speed reports.
LOOP2: CTRL2 issues CA2 to PROC2 using FB2 and FB1 reports.

## Step 3 Unsafe control actions

[UCAS]
UCA1: CA2 is provided while the train is still moving. (control loop: LOOP2; related: H1)
UCA2: CA1 is not provided when the speed limit is exceeded. (control loop: LOOP1; related: H2)

## Step 4 Loss scenarios

[LOSS_SCENARIOS]
LS1: The speed sensor reports zero while the train coasts, so the door controller believes the train is stopped. (uca: UCA1)
";

/// A Step-1-only document with an uncovered loss, used to exercise coverage
/// findings and repair proposals.
pub const GAPPY_STEP1_DOC: &str = "\
[SYSTEM_DESCRIPTION]
An automated metro train with platform doors and speed sensors.

## Step 1

[LOSSES]
L1: Loss of passenger life.
L2: Loss of service availability.

[HAZARDS]
H1: Train doors are open while the train is moving. (leads_to: L1)
";

/// Generator that replays a fixed script of responses and records every
/// prompt it was given.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of generate calls made.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(GeneratorError::Backend("script exhausted".to_string()));
        }
        Ok(responses.remove(0))
    }
}

/// Generator whose backend is always down.
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GeneratorError> {
        Err(GeneratorError::Unavailable(
            "no backend configured".to_string(),
        ))
    }
}

/// Install a test tracing subscriber once per process. Safe to call from
/// every test.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
