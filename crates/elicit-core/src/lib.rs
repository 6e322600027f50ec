//! Elicit Core - types, errors, configuration, and methodology registry

pub mod concepts;
pub mod config;
pub mod error;
pub mod methodology;
pub mod signals;
pub mod strategy;
pub mod types;

pub use concepts::{ConceptCatalog, ConceptElement, ConceptRegistry};
pub use config::InterviewConfig;
pub use error::{Error, Result};
pub use methodology::{MethodologyRegistry, MethodologySchema};
pub use signals::SignalSet;
pub use strategy::{Focus, Phase, Strategy, StrategyCategory, StrategyKind};
pub use types::*;
