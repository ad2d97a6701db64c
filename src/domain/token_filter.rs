//! Token Filter
//!
//! Static pre-trade screen on liquidity, volume, 24h move and symbol lists.
//! Runs before the risk gate so obviously untradeable pairs never reach the oracle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::market::MarketSnapshot;

pub const DEFAULT_MIN_LIQUIDITY_USD: f64 = 10_000.0;
pub const DEFAULT_MIN_VOLUME_24H_USD: f64 = 50_000.0;
pub const DEFAULT_MIN_PRICE_CHANGE_24H: f64 = -99.0;
pub const DEFAULT_MAX_PRICE_CHANGE_24H: f64 = 1000.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterRejection {
    #[error("Liquidity ${0:.0} below minimum ${1:.0}")]
    LowLiquidity(f64, f64),
    #[error("24h volume ${0:.0} below minimum ${1:.0}")]
    LowVolume(f64, f64),
    #[error("24h price change {0:.1}% outside [{1:.1}%, {2:.1}%]")]
    PriceChangeOutOfRange(f64, f64, f64),
    #[error("Meme coins excluded: {0}")]
    MemeCoin(String),
    #[error("Token {0} is blocked")]
    Blocked(String),
    #[error("Token {0} is not in the allow list")]
    NotAllowed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity_usd: f64,
    #[serde(default = "default_min_volume")]
    pub min_volume_24h_usd: f64,
    #[serde(default = "default_min_change")]
    pub min_price_change_24h: f64,
    #[serde(default = "default_max_change")]
    pub max_price_change_24h: f64,
    #[serde(default)]
    pub exclude_meme_coins: bool,
    /// Empty means every symbol is allowed
    #[serde(default)]
    pub allowed_tokens: Vec<String>,
    #[serde(default)]
    pub blocked_tokens: Vec<String>,
}

fn default_min_liquidity() -> f64 {
    DEFAULT_MIN_LIQUIDITY_USD
}

fn default_min_volume() -> f64 {
    DEFAULT_MIN_VOLUME_24H_USD
}

fn default_min_change() -> f64 {
    DEFAULT_MIN_PRICE_CHANGE_24H
}

fn default_max_change() -> f64 {
    DEFAULT_MAX_PRICE_CHANGE_24H
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_liquidity_usd: DEFAULT_MIN_LIQUIDITY_USD,
            min_volume_24h_usd: DEFAULT_MIN_VOLUME_24H_USD,
            min_price_change_24h: DEFAULT_MIN_PRICE_CHANGE_24H,
            max_price_change_24h: DEFAULT_MAX_PRICE_CHANGE_24H,
            exclude_meme_coins: false,
            allowed_tokens: Vec::new(),
            blocked_tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    settings: FilterSettings,
}

impl TokenFilter {
    pub fn new(settings: FilterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// First failing criterion, or `Ok(())` if the pair passes every check
    pub fn check(&self, snapshot: &MarketSnapshot) -> Result<(), FilterRejection> {
        let s = &self.settings;

        if snapshot.liquidity_usd < s.min_liquidity_usd {
            return Err(FilterRejection::LowLiquidity(
                snapshot.liquidity_usd,
                s.min_liquidity_usd,
            ));
        }
        if snapshot.volume_24h < s.min_volume_24h_usd {
            return Err(FilterRejection::LowVolume(snapshot.volume_24h, s.min_volume_24h_usd));
        }
        if snapshot.price_change_24h < s.min_price_change_24h
            || snapshot.price_change_24h > s.max_price_change_24h
        {
            return Err(FilterRejection::PriceChangeOutOfRange(
                snapshot.price_change_24h,
                s.min_price_change_24h,
                s.max_price_change_24h,
            ));
        }
        if s.exclude_meme_coins && snapshot.base_token_name.to_lowercase().contains("meme") {
            return Err(FilterRejection::MemeCoin(snapshot.base_token_name.clone()));
        }
        if s.blocked_tokens.contains(&snapshot.base_token_symbol) {
            return Err(FilterRejection::Blocked(snapshot.base_token_symbol.clone()));
        }
        if !s.allowed_tokens.is_empty() && !s.allowed_tokens.contains(&snapshot.base_token_symbol)
        {
            return Err(FilterRejection::NotAllowed(snapshot.base_token_symbol.clone()));
        }
        Ok(())
    }

    pub fn passes(&self, snapshot: &MarketSnapshot) -> bool {
        self.check(snapshot).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_snapshot() -> MarketSnapshot {
        MarketSnapshot {
            pair_address: "Pair1".to_string(),
            base_token_address: "Tok1".to_string(),
            base_token_name: "Solid Token".to_string(),
            base_token_symbol: "SOLID".to_string(),
            price_usd: 1.0,
            volume_24h: 80_000.0,
            liquidity_usd: 25_000.0,
            price_change_24h: 12.0,
        }
    }

    #[test]
    fn test_healthy_pair_passes() {
        assert!(TokenFilter::default().passes(&healthy_snapshot()));
    }

    #[test]
    fn test_low_liquidity() {
        let mut snapshot = healthy_snapshot();
        snapshot.liquidity_usd = 5_000.0;
        assert!(matches!(
            TokenFilter::default().check(&snapshot),
            Err(FilterRejection::LowLiquidity(_, _))
        ));
    }

    #[test]
    fn test_low_volume() {
        let mut snapshot = healthy_snapshot();
        snapshot.volume_24h = 100.0;
        assert!(matches!(
            TokenFilter::default().check(&snapshot),
            Err(FilterRejection::LowVolume(_, _))
        ));
    }

    #[test]
    fn test_price_change_range() {
        let mut snapshot = healthy_snapshot();
        snapshot.price_change_24h = 1500.0;
        assert!(!TokenFilter::default().passes(&snapshot));
        snapshot.price_change_24h = -99.5;
        assert!(!TokenFilter::default().passes(&snapshot));
    }

    #[test]
    fn test_meme_exclusion() {
        let mut snapshot = healthy_snapshot();
        snapshot.base_token_name = "Super MEME Dog".to_string();
        assert!(TokenFilter::default().passes(&snapshot));

        let filter = TokenFilter::new(FilterSettings {
            exclude_meme_coins: true,
            ..FilterSettings::default()
        });
        assert!(matches!(filter.check(&snapshot), Err(FilterRejection::MemeCoin(_))));
    }

    #[test]
    fn test_block_and_allow_lists() {
        let blocked = TokenFilter::new(FilterSettings {
            blocked_tokens: vec!["SOLID".to_string()],
            ..FilterSettings::default()
        });
        assert!(matches!(
            blocked.check(&healthy_snapshot()),
            Err(FilterRejection::Blocked(_))
        ));

        let allow_other = TokenFilter::new(FilterSettings {
            allowed_tokens: vec!["OTHER".to_string()],
            ..FilterSettings::default()
        });
        assert!(matches!(
            allow_other.check(&healthy_snapshot()),
            Err(FilterRejection::NotAllowed(_))
        ));

        let allow_solid = TokenFilter::new(FilterSettings {
            allowed_tokens: vec!["SOLID".to_string()],
            ..FilterSettings::default()
        });
        assert!(allow_solid.passes(&healthy_snapshot()));
    }

    #[test]
    fn test_settings_defaults_from_toml() {
        let settings: FilterSettings = toml::from_str("exclude_meme_coins = true").unwrap();
        assert_eq!(settings.min_liquidity_usd, DEFAULT_MIN_LIQUIDITY_USD);
        assert_eq!(settings.min_volume_24h_usd, DEFAULT_MIN_VOLUME_24H_USD);
        assert!(settings.exclude_meme_coins);
        assert!(settings.allowed_tokens.is_empty());
    }
}
