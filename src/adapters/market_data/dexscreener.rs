//! DexScreener Pair Feed
//!
//! HTTP client for `GET {base}/pairs/{pair_address}`.
//! Accepts both the single `pair` object and the `pairs` array response shapes,
//! and numeric fields sent either as JSON numbers or as strings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::domain::MarketSnapshot;
use crate::ports::market_feed::{FeedError, MarketFeed};

pub const DEXSCREENER_API: &str = "https://api.dexscreener.com/latest/dex";
const RETRY_BASE_DELAY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct DexScreenerConfig {
    pub api_base_url: String,
    pub timeout: Duration,
    /// Extra attempts after a rate limit, 5xx or transport error
    pub max_retries: u32,
}

impl Default for DexScreenerConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEXSCREENER_API.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DexScreenerFeed {
    config: DexScreenerConfig,
    http: Client,
}

impl DexScreenerFeed {
    pub fn new() -> Result<Self, FeedError> {
        Self::with_config(DexScreenerConfig::default())
    }

    pub fn with_config(config: DexScreenerConfig) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("dexcross/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }

    async fn get_body(&self, url: &str) -> Result<String, FeedError> {
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt)).await;
            }
            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| FeedError::Unavailable(e.to_string()));
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(FeedError::PairNotFound(url.to_string()));
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        tracing::warn!(
                            "DexScreener returned {} (attempt {}/{})",
                            status,
                            attempt + 1,
                            max_retries + 1
                        );
                        last_error = Some(FeedError::Unavailable(format!("HTTP {}", status)));
                        continue;
                    }
                    return Err(FeedError::Unavailable(format!("HTTP {}", status)));
                }
                Err(e) => {
                    last_error = Some(FeedError::Unavailable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FeedError::Unavailable("Max retries exceeded".into())))
    }
}

/// Linear backoff before retry number `attempt` (1-based)
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS * u64::from(attempt))
}

#[async_trait]
impl MarketFeed for DexScreenerFeed {
    async fn fetch(&self, pair_address: &str) -> Result<MarketSnapshot, FeedError> {
        let url = format!("{}/pairs/{}", self.config.api_base_url, pair_address);
        let body = self.get_body(&url).await?;
        parse_pair_response(pair_address, &body)
    }

    fn name(&self) -> &str {
        "dexscreener"
    }
}

/// Decode a DexScreener pair response into a snapshot
pub fn parse_pair_response(pair_address: &str, body: &str) -> Result<MarketSnapshot, FeedError> {
    let response: PairResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Parse(e.to_string()))?;

    let pair = response
        .pair
        .or_else(|| response.pairs.and_then(|pairs| pairs.into_iter().next()))
        .ok_or_else(|| FeedError::PairNotFound(pair_address.to_string()))?;

    let price_usd = pair
        .price_usd
        .as_ref()
        .map(Number::value)
        .transpose()?
        .ok_or_else(|| FeedError::Parse("missing priceUsd".to_string()))?;
    if !price_usd.is_finite() || price_usd <= 0.0 {
        return Err(FeedError::Parse(format!("non-positive price {}", price_usd)));
    }

    let volume_24h = match (&pair.volume_h24, &pair.volume) {
        (Some(v), _) => v.value()?,
        (None, Some(window)) => window.h24.as_ref().map(Number::value).transpose()?.unwrap_or(0.0),
        (None, None) => 0.0,
    };
    let liquidity_usd = pair
        .liquidity
        .and_then(|l| l.usd)
        .as_ref()
        .map(Number::value)
        .transpose()?
        .unwrap_or(0.0);
    let price_change_24h = pair
        .price_change
        .and_then(|c| c.h24)
        .as_ref()
        .map(Number::value)
        .transpose()?
        .unwrap_or(0.0);

    Ok(MarketSnapshot {
        pair_address: pair.pair_address.unwrap_or_else(|| pair_address.to_string()),
        base_token_address: pair.base_token.address,
        base_token_name: pair.base_token.name,
        base_token_symbol: pair.base_token.symbol,
        price_usd,
        volume_24h,
        liquidity_usd,
        price_change_24h,
    })
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    pair: Option<PairData>,
    pairs: Option<Vec<PairData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairData {
    pair_address: Option<String>,
    base_token: BaseToken,
    price_usd: Option<Number>,
    volume_h24: Option<Number>,
    volume: Option<Window>,
    liquidity: Option<Liquidity>,
    price_change: Option<Window>,
}

#[derive(Debug, Deserialize)]
struct BaseToken {
    #[serde(default)]
    address: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    usd: Option<Number>,
}

#[derive(Debug, Deserialize)]
struct Window {
    h24: Option<Number>,
}

/// DexScreener sends prices as strings and most other figures as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value(&self) -> Result<f64, FeedError> {
        match self {
            Number::Float(v) => Ok(*v),
            Number::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| FeedError::Parse(format!("'{}': {}", s, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SINGLE_PAIR: &str = r#"{
        "pair": {
            "pairAddress": "PairAbc",
            "baseToken": {"address": "TokAbc123456", "name": "Alpha", "symbol": "ALP"},
            "priceUsd": "0.0125",
            "volumeH24": 81234.5,
            "liquidity": {"usd": 45000},
            "priceChange": {"h24": -3.2}
        }
    }"#;

    #[test]
    fn test_parse_single_pair() {
        let snapshot = parse_pair_response("PairAbc", SINGLE_PAIR).unwrap();
        assert_eq!(snapshot.pair_address, "PairAbc");
        assert_eq!(snapshot.base_token_address, "TokAbc123456");
        assert_eq!(snapshot.base_token_symbol, "ALP");
        assert_relative_eq!(snapshot.price_usd, 0.0125);
        assert_relative_eq!(snapshot.volume_24h, 81234.5);
        assert_relative_eq!(snapshot.liquidity_usd, 45000.0);
        assert_relative_eq!(snapshot.price_change_24h, -3.2);
    }

    #[test]
    fn test_parse_pairs_array() {
        let body = r#"{
            "schemaVersion": "1.0.0",
            "pairs": [{
                "pairAddress": "PairXyz",
                "baseToken": {"address": "TokXyz", "name": "Xyz", "symbol": "XYZ"},
                "priceUsd": "2.5",
                "volume": {"h24": 1000.0, "h6": 10.0},
                "priceChange": {"h24": "12.5"}
            }]
        }"#;
        let snapshot = parse_pair_response("PairXyz", body).unwrap();
        assert_relative_eq!(snapshot.price_usd, 2.5);
        assert_relative_eq!(snapshot.volume_24h, 1000.0);
        assert_relative_eq!(snapshot.liquidity_usd, 0.0);
        assert_relative_eq!(snapshot.price_change_24h, 12.5);
    }

    #[test]
    fn test_missing_pair() {
        let result = parse_pair_response("Gone", r#"{"pair": null, "pairs": null}"#);
        assert!(matches!(result, Err(FeedError::PairNotFound(_))));

        let result = parse_pair_response("Gone", r#"{"pairs": []}"#);
        assert!(matches!(result, Err(FeedError::PairNotFound(_))));
    }

    #[test]
    fn test_bad_price() {
        let body = SINGLE_PAIR.replace("\"0.0125\"", "\"abc\"");
        assert!(matches!(parse_pair_response("PairAbc", &body), Err(FeedError::Parse(_))));

        let body = SINGLE_PAIR.replace("\"0.0125\"", "\"0\"");
        assert!(matches!(parse_pair_response("PairAbc", &body), Err(FeedError::Parse(_))));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            parse_pair_response("PairAbc", "<html>"),
            Err(FeedError::Parse(_))
        ));
    }

    /// Local HTTP server answering every request with `status`; returns its base URL and hit count
    async fn serve_status(status: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{}", addr), hits)
    }

    fn feed_for(base: String, max_retries: u32) -> DexScreenerFeed {
        DexScreenerFeed::with_config(DexScreenerConfig {
            api_base_url: base,
            timeout: Duration::from_secs(5),
            max_retries,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_server_errors_retried_max_retries_times() {
        let (base, hits) = serve_status("503 Service Unavailable").await;
        let feed = feed_for(base, 2);

        let result = feed.fetch("PairAbc").await;
        assert!(matches!(result, Err(FeedError::Unavailable(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let (base, hits) = serve_status("429 Too Many Requests").await;
        let feed = feed_for(base, 0);

        let started = std::time::Instant::now();
        assert!(feed.fetch("PairAbc").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // No backoff after the final attempt
        assert!(started.elapsed() < Duration::from_millis(RETRY_BASE_DELAY_MS));
    }

    #[tokio::test]
    async fn test_not_found_not_retried() {
        let (base, hits) = serve_status("404 Not Found").await;
        let feed = feed_for(base, 2);

        assert!(matches!(feed.fetch("Gone").await, Err(FeedError::PairNotFound(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_delay_is_linear() {
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_client_creation() {
        let feed = DexScreenerFeed::new().unwrap();
        assert_eq!(feed.api_base_url(), DEXSCREENER_API);
        assert_eq!(feed.name(), "dexscreener");
    }
}
