//! Simulated risk oracle for paper trading: uniform random scores

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::RiskAssessment;
use crate::ports::risk_oracle::{OracleError, RiskOracle};

#[derive(Debug)]
pub struct SimulatedRiskOracle {
    rng: Mutex<StdRng>,
}

impl SimulatedRiskOracle {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible score sequence
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SimulatedRiskOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RiskOracle for SimulatedRiskOracle {
    async fn check(&self, token_address: &str) -> Result<RiskAssessment, OracleError> {
        let score = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| OracleError::Unavailable("rng lock poisoned".to_string()))?;
            rng.gen_range(0.0..1.0)
        };
        Ok(RiskAssessment::from_score(token_address, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scores_in_range() {
        let oracle = SimulatedRiskOracle::seeded(7);
        for _ in 0..50 {
            let assessment = oracle.check("Tok").await.unwrap();
            assert!((0.0..1.0).contains(&assessment.risk_score));
        }
    }

    #[tokio::test]
    async fn test_seeded_is_reproducible() {
        let a = SimulatedRiskOracle::seeded(42);
        let b = SimulatedRiskOracle::seeded(42);
        for _ in 0..5 {
            assert_eq!(
                a.check("Tok").await.unwrap().risk_score,
                b.check("Tok").await.unwrap().risk_score
            );
        }
    }
}
