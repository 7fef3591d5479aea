#![allow(dead_code)]
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Verdict of the news guardrail service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardrailMode {
    Normal,
    Reduced,
    Blocked,
}

impl GuardrailMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailMode::Normal => "normal",
            GuardrailMode::Reduced => "reduced",
            GuardrailMode::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardrailVerdict {
    pub mode: GuardrailMode,
    pub reasons: Vec<String>,
}

impl GuardrailVerdict {
    pub fn normal() -> Self {
        Self {
            mode: GuardrailMode::Normal,
            reasons: Vec::new(),
        }
    }

    pub fn blocked(reason: &str) -> Self {
        Self {
            mode: GuardrailMode::Blocked,
            reasons: vec![reason.to_string()],
        }
    }
}

/// News guardrail collaborator. An unreachable service must surface as
/// `Blocked` (fail-safe), never as an error the scheduler has to handle.
#[async_trait]
pub trait GuardrailAdapter: Send + Sync {
    async fn can_trade_now(&self, strategy: &str) -> GuardrailVerdict;
}

/// Fixed-verdict guardrail used in replay and in tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticGuardrail {
    pub mode: GuardrailMode,
}

impl StaticGuardrail {
    pub fn normal() -> Self {
        Self {
            mode: GuardrailMode::Normal,
        }
    }

    pub fn blocked() -> Self {
        Self {
            mode: GuardrailMode::Blocked,
        }
    }
}

#[async_trait]
impl GuardrailAdapter for StaticGuardrail {
    async fn can_trade_now(&self, _strategy: &str) -> GuardrailVerdict {
        GuardrailVerdict {
            mode: self.mode,
            reasons: Vec::new(),
        }
    }
}

/// Wraps a fallible lookup into the fail-safe contract.
pub fn fail_safe(result: Result<GuardrailVerdict, anyhow::Error>) -> GuardrailVerdict {
    match result {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!("guardrail unreachable, failing safe to blocked: {e}");
            GuardrailVerdict::blocked("guardrail unreachable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_guardrail_blocks() {
        let verdict = fail_safe(Err(anyhow::anyhow!("connection refused")));
        assert_eq!(verdict.mode, GuardrailMode::Blocked);
        assert!(!verdict.reasons.is_empty());
    }
}
