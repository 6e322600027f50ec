//! Elicit Engine - the turn-processing pipeline and its services

pub mod extraction;
pub mod question;
pub mod session;
pub mod signals;
pub mod slots;
pub mod strategy;

pub use extraction::{ExtractionResult, ExtractionService};
pub use question::QuestionService;
pub use session::{SessionService, TurnResult};
pub use signals::SignalExtractor;
pub use slots::CanonicalSlotService;
pub use strategy::{SelectionResult, StrategyService};
