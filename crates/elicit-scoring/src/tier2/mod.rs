//! Tier-2 weighted scorers. Each scores one orthogonal dimension in
//! [0, 2] (1.0 neutral) and contributes weight × raw_score.

pub mod ambiguity;
pub mod cluster_saturation;
pub mod contrast_opportunity;
pub mod coverage_gap;
pub mod depth_breadth;
pub mod engagement;
pub mod graph_utils;
pub mod novelty;
pub mod peripheral_readiness;
pub mod saturation;
pub mod strategy_diversity;

pub use ambiguity::AmbiguityScorer;
pub use cluster_saturation::ClusterSaturationScorer;
pub use contrast_opportunity::ContrastOpportunityScorer;
pub use coverage_gap::CoverageGapScorer;
pub use depth_breadth::DepthBreadthBalanceScorer;
pub use engagement::EngagementScorer;
pub use novelty::NoveltyScorer;
pub use peripheral_readiness::PeripheralReadinessScorer;
pub use saturation::{compute_saturation_metrics, SaturationScorer};
pub use strategy_diversity::StrategyDiversityScorer;
