//! Market Data Adapters
//!
//! - `DexScreenerFeed`: pair snapshots (price, volume, liquidity, 24h move)

mod dexscreener;

pub use dexscreener::{parse_pair_response, DexScreenerConfig, DexScreenerFeed, DEXSCREENER_API};
