//! Engine construction from configuration.

use crate::tier1::*;
use crate::tier2::*;
use crate::two_tier::{TwoTierEngine, VetoScorer, WeightedScorer};
use elicit_core::{config::ScorerConfig, InterviewConfig, Result};
use tracing::warn;

fn build_tier1(config: &ScorerConfig) -> Option<Box<dyn VetoScorer>> {
    match config.id.as_str() {
        "knowledge_ceiling" => Some(Box::new(KnowledgeCeilingScorer::from_config(config))),
        "element_exhausted" => Some(Box::new(ElementExhaustedScorer::from_config(config))),
        "recent_redundancy" => Some(Box::new(RecentRedundancyScorer::from_config(config))),
        "clarification_veto" => Some(Box::new(ClarificationVetoScorer::from_config(config))),
        "consecutive_exhaustion" => Some(Box::new(ConsecutiveExhaustionScorer::from_config(config))),
        "question_repetition" => Some(Box::new(QuestionRepetitionScorer::from_config(config))),
        other => {
            warn!(scorer = other, "unknown tier-1 scorer id, skipping");
            None
        }
    }
}

fn build_tier2(config: &ScorerConfig) -> Option<Box<dyn WeightedScorer>> {
    match config.id.as_str() {
        "coverage_gap" => Some(Box::new(CoverageGapScorer::from_config(config))),
        "ambiguity" => Some(Box::new(AmbiguityScorer::from_config(config))),
        "depth_breadth_balance" => Some(Box::new(DepthBreadthBalanceScorer::from_config(config))),
        "engagement" => Some(Box::new(EngagementScorer::from_config(config))),
        "strategy_diversity" => Some(Box::new(StrategyDiversityScorer::from_config(config))),
        "novelty" => Some(Box::new(NoveltyScorer::from_config(config))),
        "saturation" => Some(Box::new(SaturationScorer::from_config(config))),
        "cluster_saturation" => Some(Box::new(ClusterSaturationScorer::from_config(config))),
        "contrast_opportunity" => Some(Box::new(ContrastOpportunityScorer::from_config(config))),
        "peripheral_readiness" => Some(Box::new(PeripheralReadinessScorer::from_config(config))),
        other => {
            warn!(scorer = other, "unknown tier-2 scorer id, skipping");
            None
        }
    }
}

/// Construct the two-tier engine from configuration. Weight-sum
/// validation happens inside `TwoTierEngine::new` and a mismatch is a
/// fatal configuration error.
pub fn build_engine(config: &InterviewConfig) -> Result<TwoTierEngine> {
    let tier1 = config
        .scorers
        .tier1
        .iter()
        .filter(|s| s.enabled)
        .filter_map(build_tier1)
        .collect();

    let tier2 = config
        .scorers
        .tier2
        .iter()
        .filter(|s| s.enabled)
        .filter_map(build_tier2)
        .collect();

    TwoTierEngine::new(
        tier1,
        tier2,
        config.engine.veto_on_first,
        config.engine.weight_tolerance,
    )
}
