//! Risk gate: turns oracle answers into a per-symbol trade/skip decision

use std::sync::Arc;

use crate::domain::{GateDecision, UnknownRiskPolicy};
use crate::ports::RiskOracle;

#[derive(Clone)]
pub struct RiskGate {
    oracle: Arc<dyn RiskOracle>,
    policy: UnknownRiskPolicy,
}

impl RiskGate {
    pub fn new(oracle: Arc<dyn RiskOracle>, policy: UnknownRiskPolicy) -> Self {
        Self { oracle, policy }
    }

    pub fn policy(&self) -> UnknownRiskPolicy {
        self.policy
    }

    /// Only a critical assessment blocks. Oracle failures follow the configured policy.
    pub async fn evaluate(&self, token_address: &str) -> GateDecision {
        match self.oracle.check(token_address).await {
            Ok(assessment) => {
                for alert in &assessment.alerts {
                    tracing::warn!("Risk alert for {}: {}", token_address, alert);
                }
                let decision = GateDecision::from_assessment(&assessment);
                if !decision.allows_trading() {
                    tracing::warn!(
                        "Trading blocked for {}: {} risk (score {:.2})",
                        token_address,
                        assessment.risk_level,
                        assessment.risk_score
                    );
                } else {
                    tracing::debug!(
                        "Risk {} for {} (score {:.2})",
                        assessment.risk_level,
                        token_address,
                        assessment.risk_score
                    );
                }
                decision
            }
            Err(e) => {
                let decision = GateDecision::unknown(self.policy);
                tracing::warn!(
                    "Risk oracle failed for {}: {} ({:?}, trading {})",
                    token_address,
                    e,
                    self.policy,
                    if decision.allows_trading() { "allowed" } else { "skipped" }
                );
                decision
            }
        }
    }

    pub async fn should_trade(&self, token_address: &str) -> bool {
        self.evaluate(token_address).await.allows_trading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;
    use crate::ports::mocks::MockRiskOracle;

    fn gate(oracle: MockRiskOracle, policy: UnknownRiskPolicy) -> RiskGate {
        RiskGate::new(Arc::new(oracle), policy)
    }

    #[tokio::test]
    async fn test_critical_blocks() {
        let gate = gate(
            MockRiskOracle::new().with_score("Rug", 0.9),
            UnknownRiskPolicy::FailOpen,
        );
        assert_eq!(gate.evaluate("Rug").await, GateDecision::Blocked(RiskLevel::Critical));
        assert!(!gate.should_trade("Rug").await);
        assert!(gate.should_trade("Clean").await);
    }

    #[tokio::test]
    async fn test_high_passes() {
        let gate = gate(
            MockRiskOracle::new().with_score("Hot", 0.65),
            UnknownRiskPolicy::FailClosed,
        );
        let decision = gate.evaluate("Hot").await;
        assert_eq!(decision, GateDecision::Pass(RiskLevel::High));
        assert!(decision.allows_trading());
    }

    #[tokio::test]
    async fn test_outage_follows_policy() {
        let open = gate(MockRiskOracle::unavailable(), UnknownRiskPolicy::FailOpen);
        assert!(open.evaluate("Tok").await.allows_trading());

        let closed = gate(MockRiskOracle::unavailable(), UnknownRiskPolicy::FailClosed);
        assert_eq!(
            closed.evaluate("Tok").await,
            GateDecision::Unknown { allowed: false }
        );
        assert_eq!(closed.policy(), UnknownRiskPolicy::FailClosed);
    }
}
