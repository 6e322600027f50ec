//! Strategy catalog types, focus variants, and interview phases

use serde::{Deserialize, Serialize};

/// Built-in questioning strategies.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Deepen,
    Broaden,
    CoverElement,
    Closing,
    Reflection,
    Synthesis,
    Laddering,
    Ease,
    Bridge,
    Contrast,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Deepen => "deepen",
            StrategyKind::Broaden => "broaden",
            StrategyKind::CoverElement => "cover_element",
            StrategyKind::Closing => "closing",
            StrategyKind::Reflection => "reflection",
            StrategyKind::Synthesis => "synthesis",
            StrategyKind::Laddering => "laddering",
            StrategyKind::Ease => "ease",
            StrategyKind::Bridge => "bridge",
            StrategyKind::Contrast => "contrast",
        }
    }

    /// Strategies that keep asking for "more" content. The exhaustion and
    /// repetition vetoes target these.
    pub fn asks_for_more(&self) -> bool {
        matches!(
            self,
            StrategyKind::Deepen | StrategyKind::Broaden | StrategyKind::CoverElement
        )
    }

    /// Process-management strategies are exempt from confusion vetoes.
    pub fn is_process_management(&self) -> bool {
        matches!(
            self,
            StrategyKind::Closing | StrategyKind::Reflection | StrategyKind::Ease
        )
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyCategory {
    Depth,
    Breadth,
    Coverage,
    Closing,
    Reflection,
    Transition,
    Contrast,
    Peripheral,
}

/// A questioning strategy with its base priority and eligibility rules.
#[derive(Clone, Debug, Serialize)]
pub struct Strategy {
    pub kind: StrategyKind,
    pub name: &'static str,
    pub description: &'static str,
    pub category: StrategyCategory,
    pub priority_base: f64,
    pub enabled: bool,
    pub min_turns: Option<u32>,
    pub emergency_only: bool,
}

impl Strategy {
    fn new(
        kind: StrategyKind,
        name: &'static str,
        description: &'static str,
        category: StrategyCategory,
        priority_base: f64,
    ) -> Self {
        Self {
            kind,
            name,
            description,
            category,
            priority_base,
            enabled: true,
            min_turns: None,
            emergency_only: false,
        }
    }
}

/// The built-in strategy catalog.
pub fn builtin_strategies() -> Vec<Strategy> {
    vec![
        Strategy::new(
            StrategyKind::Deepen,
            "Deepen Understanding",
            "Probe deeper into the most recent concept - ask why it matters",
            StrategyCategory::Depth,
            1.0,
        ),
        Strategy::new(
            StrategyKind::Broaden,
            "Explore Breadth",
            "Open new ground - invite aspects not yet discussed",
            StrategyCategory::Breadth,
            0.9,
        ),
        Strategy::new(
            StrategyKind::CoverElement,
            "Cover Stimulus Element",
            "Bring an uncovered stimulus element into the conversation",
            StrategyCategory::Coverage,
            1.1,
        ),
        Strategy {
            min_turns: Some(8),
            ..Strategy::new(
                StrategyKind::Closing,
                "Closing Interview",
                "Wrap up warmly and invite any final thoughts",
                StrategyCategory::Closing,
                0.5,
            )
        },
        Strategy {
            emergency_only: true,
            ..Strategy::new(
                StrategyKind::Reflection,
                "Reflection / Meta-Question",
                "Step back and invite the respondent to reflect on the conversation",
                StrategyCategory::Reflection,
                0.7,
            )
        },
        Strategy::new(
            StrategyKind::Synthesis,
            "Synthesize",
            "Play back a summary of what was heard and check it resonates",
            StrategyCategory::Reflection,
            0.8,
        ),
        Strategy::new(
            StrategyKind::Laddering,
            "Laddering",
            "Climb the means-end chain - from attributes toward personal values",
            StrategyCategory::Depth,
            1.0,
        ),
        Strategy::new(
            StrategyKind::Ease,
            "Ease",
            "Lower the effort - a light, comfortable question to rebuild rapport",
            StrategyCategory::Transition,
            0.6,
        ),
        Strategy::new(
            StrategyKind::Bridge,
            "Bridge",
            "Connect to a related but unexplored cluster of concepts",
            StrategyCategory::Peripheral,
            0.8,
        ),
        Strategy::new(
            StrategyKind::Contrast,
            "Contrast",
            "Introduce a counter-example or opposite stance to sharpen the picture",
            StrategyCategory::Contrast,
            0.8,
        ),
    ]
}

/// What the next question is about.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "focus_type", rename_all = "snake_case")]
pub enum Focus {
    DepthExploration {
        node_id: Option<String>,
        description: String,
        confidence: f64,
    },
    BreadthExploration {
        description: String,
    },
    CoverageGap {
        element_id: String,
        description: String,
    },
    Closing {
        description: String,
    },
    Reflection {
        description: String,
    },
}

impl Focus {
    pub fn description(&self) -> &str {
        match self {
            Focus::DepthExploration { description, .. }
            | Focus::BreadthExploration { description }
            | Focus::CoverageGap { description, .. }
            | Focus::Closing { description }
            | Focus::Reflection { description } => description,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            Focus::DepthExploration { node_id, .. } => node_id.as_deref(),
            _ => None,
        }
    }

    pub fn element_id(&self) -> Option<&str> {
        match self {
            Focus::CoverageGap { element_id, .. } => Some(element_id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Focus::DepthExploration { .. } => "depth_exploration",
            Focus::BreadthExploration { .. } => "breadth_exploration",
            Focus::CoverageGap { .. } => "coverage_gap",
            Focus::Closing { .. } => "closing",
            Focus::Reflection { .. } => "reflection",
        }
    }
}

/// Deterministic turn-number bucket.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Exploratory,
    Focused,
    Closing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Exploratory => "exploratory",
            Phase::Focused => "focused",
            Phase::Closing => "closing",
        }
    }
}
