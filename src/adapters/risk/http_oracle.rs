//! HTTP risk oracle
//!
//! `GET {api_url}/{chain}/{token_address}` returning `{"risk_score": <0..1>}`.
//! Level and alerts are derived locally from the score.
//! An optional API key is sent as `x-api-key`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::domain::RiskAssessment;
use crate::ports::risk_oracle::{OracleError, RiskOracle};

#[derive(Clone)]
pub struct HttpRiskOracle {
    http: Client,
    api_url: String,
    chain: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    risk_score: f64,
}

impl HttpRiskOracle {
    pub fn new(api_url: &str, chain: &str, timeout: Duration) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dexcross/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OracleError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            chain: chain.to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn endpoint(&self, token_address: &str) -> String {
        format!("{}/{}/{}", self.api_url, self.chain, token_address)
    }
}

/// Decode a score payload
pub fn parse_risk_response(token_address: &str, body: &str) -> Result<RiskAssessment, OracleError> {
    let response: ScoreResponse =
        serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;
    if !response.risk_score.is_finite() {
        return Err(OracleError::Malformed(format!(
            "non-finite risk score {}",
            response.risk_score
        )));
    }
    Ok(RiskAssessment::from_score(token_address, response.risk_score))
}

#[async_trait]
impl RiskOracle for HttpRiskOracle {
    async fn check(&self, token_address: &str) -> Result<RiskAssessment, OracleError> {
        let mut request = self.http.get(self.endpoint(token_address));
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        parse_risk_response(token_address, &body)
    }
}
