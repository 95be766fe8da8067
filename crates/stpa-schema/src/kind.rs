//! Entity kind registry
//!
//! Static table mapping every entity kind to its owning section tag, ID
//! prefix, guided step and numbering policy. The table is total: looking up
//! the metadata of a kind can never fail.

use serde::{Deserialize, Serialize};

/// An entity kind recognized inside an analysis document.
///
/// Declaration order is the canonical renumbering order within each guided
/// step (losses before hazards before constraints, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Unacceptable outcome (L)
    Loss,
    /// System-level hazard (H)
    Hazard,
    /// Safety constraint addressing hazards (SC)
    SafetyConstraint,
    /// Refinement of an existing hazard (RH)
    RefinedHazard,
    /// Controller in the control structure (CTRL)
    Controller,
    /// Controlled process (PROC)
    ControlledProcess,
    /// Actuator (ACT)
    Actuator,
    /// Sensor (SEN)
    Sensor,
    /// External system interacting with the control structure (EXT)
    ExternalSystem,
    /// Control action issued by a controller (CA)
    ControlAction,
    /// Feedback path (FB)
    Feedback,
    /// Closed control loop tying the above together (LOOP)
    ControlLoop,
    /// Unsafe control action (UCA)
    Uca,
    /// Causal loss scenario (LS)
    LossScenario,
}

/// Immutable registry entry for a [`Kind`].
#[derive(Debug, Clone, Copy)]
pub struct KindMeta {
    /// The kind this entry describes
    pub kind: Kind,
    /// Canonical (underscore style) section tag owning entries of this kind
    pub section: &'static str,
    /// ID prefix, e.g. `H` for hazards
    pub id_prefix: &'static str,
    /// The guided step owning the section
    pub step: GuidedStep,
    /// Whether entries may be auto-numbered when no explicit ID is supplied
    pub allow_auto_number: bool,
}

/// The full registry, in canonical kind order.
static REGISTRY: [KindMeta; 14] = [
    KindMeta {
        kind: Kind::Loss,
        section: "LOSSES",
        id_prefix: "L",
        step: GuidedStep::Step1,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::Hazard,
        section: "HAZARDS",
        id_prefix: "H",
        step: GuidedStep::Step1,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::SafetyConstraint,
        section: "SAFETY_CONSTRAINTS",
        id_prefix: "SC",
        step: GuidedStep::Step1,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::RefinedHazard,
        section: "REFINED_HAZARDS",
        id_prefix: "RH",
        step: GuidedStep::Step1,
        allow_auto_number: false,
    },
    KindMeta {
        kind: Kind::Controller,
        section: "CONTROLLERS",
        id_prefix: "CTRL",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::ControlledProcess,
        section: "CONTROLLED_PROCESSES",
        id_prefix: "PROC",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::Actuator,
        section: "ACTUATORS",
        id_prefix: "ACT",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::Sensor,
        section: "SENSORS",
        id_prefix: "SEN",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::ExternalSystem,
        section: "EXTERNAL_SYSTEMS",
        id_prefix: "EXT",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::ControlAction,
        section: "CONTROL_ACTIONS",
        id_prefix: "CA",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::Feedback,
        section: "FEEDBACK",
        id_prefix: "FB",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::ControlLoop,
        section: "CONTROL_LOOPS",
        id_prefix: "LOOP",
        step: GuidedStep::Step2,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::Uca,
        section: "UCAS",
        id_prefix: "UCA",
        step: GuidedStep::Step3,
        allow_auto_number: true,
    },
    KindMeta {
        kind: Kind::LossScenario,
        section: "LOSS_SCENARIOS",
        id_prefix: "LS",
        step: GuidedStep::Step4,
        allow_auto_number: true,
    },
];

impl Kind {
    /// All kinds, in canonical renumbering order.
    pub const ALL: [Kind; 14] = [
        Kind::Loss,
        Kind::Hazard,
        Kind::SafetyConstraint,
        Kind::RefinedHazard,
        Kind::Controller,
        Kind::ControlledProcess,
        Kind::Actuator,
        Kind::Sensor,
        Kind::ExternalSystem,
        Kind::ControlAction,
        Kind::Feedback,
        Kind::ControlLoop,
        Kind::Uca,
        Kind::LossScenario,
    ];

    /// Look up the registry entry for this kind. Total and pure.
    #[inline]
    #[must_use]
    pub fn meta(self) -> &'static KindMeta {
        &REGISTRY[self as usize]
    }

    /// Canonical section tag owning this kind's entries.
    #[inline]
    #[must_use]
    pub fn section(self) -> &'static str {
        self.meta().section
    }

    /// ID prefix for entries of this kind.
    #[inline]
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        self.meta().id_prefix
    }

    /// The guided step owning this kind's section.
    #[inline]
    #[must_use]
    pub fn step(self) -> GuidedStep {
        self.meta().step
    }

    /// Whether entries of this kind may be numbered automatically.
    #[inline]
    #[must_use]
    pub fn allow_auto_number(self) -> bool {
        self.meta().allow_auto_number
    }

    /// Human-readable kind name used in error messages.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Kind::Loss => "loss",
            Kind::Hazard => "hazard",
            Kind::SafetyConstraint => "safety constraint",
            Kind::RefinedHazard => "refined hazard",
            Kind::Controller => "controller",
            Kind::ControlledProcess => "controlled process",
            Kind::Actuator => "actuator",
            Kind::Sensor => "sensor",
            Kind::ExternalSystem => "external system",
            Kind::ControlAction => "control action",
            Kind::Feedback => "feedback",
            Kind::ControlLoop => "control loop",
            Kind::Uca => "unsafe control action",
            Kind::LossScenario => "loss scenario",
        }
    }

    /// Resolve a kind from its ID prefix (exact match).
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Kind> {
        Kind::ALL
            .into_iter()
            .find(|k| k.id_prefix() == prefix)
    }

    /// Resolve a kind from a section heading label in either underscore or
    /// space style, case-insensitively.
    #[must_use]
    pub fn from_section_label(label: &str) -> Option<Kind> {
        let normalized = label.trim().to_ascii_uppercase().replace(' ', "_");
        Kind::ALL
            .into_iter()
            .find(|k| k.section() == normalized)
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One of the four ordinal guided analysis stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GuidedStep {
    /// Losses, hazards, constraints, refined hazards
    Step1,
    /// Control-structure entities
    Step2,
    /// Unsafe control actions
    Step3,
    /// Loss scenarios
    Step4,
}

impl GuidedStep {
    /// All steps in order.
    pub const ALL: [GuidedStep; 4] = [
        GuidedStep::Step1,
        GuidedStep::Step2,
        GuidedStep::Step3,
        GuidedStep::Step4,
    ];

    /// Ordinal number of the step (1-4).
    #[inline]
    #[must_use]
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    /// Resolve a step from its ordinal number.
    #[must_use]
    pub fn from_number(n: u8) -> Option<GuidedStep> {
        match n {
            1 => Some(GuidedStep::Step1),
            2 => Some(GuidedStep::Step2),
            3 => Some(GuidedStep::Step3),
            4 => Some(GuidedStep::Step4),
            _ => None,
        }
    }

    /// Kinds owned by this step, in the fixed renumbering order.
    #[must_use]
    pub fn kinds(self) -> &'static [Kind] {
        match self {
            GuidedStep::Step1 => &[
                Kind::Loss,
                Kind::Hazard,
                Kind::SafetyConstraint,
                Kind::RefinedHazard,
            ],
            GuidedStep::Step2 => &[
                Kind::Controller,
                Kind::ControlledProcess,
                Kind::Actuator,
                Kind::Sensor,
                Kind::ExternalSystem,
                Kind::ControlAction,
                Kind::Feedback,
                Kind::ControlLoop,
            ],
            GuidedStep::Step3 => &[Kind::Uca],
            GuidedStep::Step4 => &[Kind::LossScenario],
        }
    }

    /// Section tags owned by this step.
    pub fn sections(self) -> impl Iterator<Item = &'static str> {
        self.kinds().iter().map(|k| k.section())
    }
}

impl std::fmt::Display for GuidedStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Step {}", self.number())
    }
}
