pub mod confluence;
pub mod ict;
#[cfg(test)]
pub mod test_support;

pub use confluence::*;
pub use ict::*;

use crate::analytics::MarketSnapshot;
use crate::config::RunConfig;
use crate::types::Decision;

/// Runtime-selected strategy. A tagged variant rather than a trait object:
/// the scheduler owns it by value and dispatch is a plain match.
#[derive(Debug, Clone)]
pub enum StrategyKind {
    Ict(IctStrategy),
    Confluence(ConfluenceStrategy),
}

impl StrategyKind {
    pub fn from_config(config: &RunConfig) -> Self {
        if config.strategy.require_ict_pipeline {
            StrategyKind::Ict(IctStrategy)
        } else {
            StrategyKind::Confluence(ConfluenceStrategy)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Ict(_) => "ict",
            StrategyKind::Confluence(_) => "confluence",
        }
    }

    /// Uniform contract: every evaluation of every tick yields exactly one
    /// `Decision`.
    pub fn evaluate(&self, snapshot: &MarketSnapshot, config: &RunConfig) -> Decision {
        match self {
            StrategyKind::Ict(s) => s.evaluate(snapshot, config),
            StrategyKind::Confluence(s) => s.evaluate(snapshot, config),
        }
    }
}
