//! Rug-pull risk levels and the gate decision derived from them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Score at or above which a token is critical
pub const CRITICAL_SCORE: f64 = 0.8;
pub const HIGH_SCORE: f64 = 0.6;
pub const MEDIUM_SCORE: f64 = 0.4;

/// Score above which the holder-concentration alert is raised
pub const CONCENTRATION_ALERT_SCORE: f64 = 0.7;
pub const CONCENTRATION_ALERT: &str = "High concentration of tokens in few wallets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= CRITICAL_SCORE {
            RiskLevel::Critical
        } else if score >= HIGH_SCORE {
            RiskLevel::High
        } else if score >= MEDIUM_SCORE {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Only critical risk blocks trading
    pub fn blocks_trading(&self) -> bool {
        matches!(self, RiskLevel::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub token_address: String,
    /// 0.0 (safe) to 1.0 (certain rug)
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub alerts: Vec<String>,
}

impl RiskAssessment {
    /// Derive level and alerts from a raw score (clamped to [0, 1])
    pub fn from_score(token_address: impl Into<String>, score: f64) -> Self {
        let risk_score = if score.is_nan() { 1.0 } else { score.clamp(0.0, 1.0) };
        let mut alerts = Vec::new();
        if risk_score > CONCENTRATION_ALERT_SCORE {
            alerts.push(CONCENTRATION_ALERT.to_string());
        }
        Self {
            token_address: token_address.into(),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            alerts,
        }
    }
}

/// What to do when the risk oracle cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRiskPolicy {
    /// Trade anyway
    FailOpen,
    /// Skip the symbol this cycle
    FailClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Pass(RiskLevel),
    Blocked(RiskLevel),
    /// Oracle unavailable; `allowed` reflects the configured policy
    Unknown { allowed: bool },
}

impl GateDecision {
    pub fn from_assessment(assessment: &RiskAssessment) -> Self {
        if assessment.risk_level.blocks_trading() {
            GateDecision::Blocked(assessment.risk_level)
        } else {
            GateDecision::Pass(assessment.risk_level)
        }
    }

    pub fn unknown(policy: UnknownRiskPolicy) -> Self {
        GateDecision::Unknown {
            allowed: policy == UnknownRiskPolicy::FailOpen,
        }
    }

    pub fn allows_trading(&self) -> bool {
        match self {
            GateDecision::Pass(_) => true,
            GateDecision::Blocked(_) => false,
            GateDecision::Unknown { allowed } => *allowed,
        }
    }
}
