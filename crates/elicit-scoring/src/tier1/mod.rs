//! Tier-1 hard-constraint scorers. All are pure functions of state with
//! a single boolean veto decision; vetoes have equal power.

pub mod clarification_veto;
pub mod consecutive_exhaustion;
pub mod element_exhausted;
pub mod knowledge_ceiling;
pub mod question_repetition;
pub mod recent_redundancy;

pub use clarification_veto::ClarificationVetoScorer;
pub use consecutive_exhaustion::ConsecutiveExhaustionScorer;
pub use element_exhausted::ElementExhaustedScorer;
pub use knowledge_ceiling::KnowledgeCeilingScorer;
pub use question_repetition::QuestionRepetitionScorer;
pub use recent_redundancy::RecentRedundancyScorer;
