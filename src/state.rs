use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::policy::{Price, Rarity, Sentiment};

#[derive(Clone)]
pub struct Config {
    pub refresh_secs: u64,
    pub sqlite_path: String,
    pub oracle_id: String,
    pub owner_id: String,
    pub feed_url: Option<String>,
    pub source_timeout_ms: u64,
    pub feed_seed: u64,
    pub mock_seed: u64,
    pub mock_delay_ms: u64,
    pub history_max_points: usize,
    pub activity_max_entries: usize,
    pub snapshot_channel_capacity: usize,
    pub persist_every_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            refresh_secs: std::env::var("REFRESH_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./market.sqlite".to_string()),
            oracle_id: std::env::var("ORACLE_ID").unwrap_or_else(|_| "oracle".to_string()),
            owner_id: std::env::var("OWNER_ID").unwrap_or_else(|_| "owner".to_string()),
            feed_url: std::env::var("FEED_URL").ok(),
            source_timeout_ms: std::env::var("SOURCE_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(2_000),
            feed_seed: std::env::var("FEED_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(11),
            mock_seed: std::env::var("MOCK_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(7),
            mock_delay_ms: std::env::var("MOCK_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(250),
            history_max_points: std::env::var("HISTORY_MAX_POINTS").ok().and_then(|v| v.parse().ok()).unwrap_or(5_000),
            activity_max_entries: std::env::var("ACTIVITY_MAX").ok().and_then(|v| v.parse().ok()).unwrap_or(500),
            snapshot_channel_capacity: std::env::var("SNAPSHOT_CHANNEL_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(64),
            persist_every_secs: std::env::var("PERSIST_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(300),
        }
    }

    pub fn sleep_until_next_refresh(&self, now_ts: u64) -> u64 {
        let next = ((now_ts / self.refresh_secs) + 1) * self.refresh_secs;
        next.saturating_sub(now_ts)
    }
}

pub fn now_ts() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A minted token. `mint_sentiment` is provenance and never changes after
/// creation; `current_sentiment` and `rarity` track the global value.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRecord {
    pub id: TokenId,
    pub owner: String,
    pub collection: String,
    pub metadata_uri: String,
    pub mint_sentiment: Sentiment,
    pub current_sentiment: Sentiment,
    pub rarity: Rarity,
    pub mint_ts: u64,
    pub mint_price: Price,
    pub attributes: BTreeMap<String, String>,
}

/// Process-wide sentiment singleton, owned by the ledger. Created at the
/// neutral default and mutated only through the oracle update path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalSentimentState {
    pub current: Sentiment,
    pub last_updated: u64,
}

impl GlobalSentimentState {
    pub fn neutral(ts: u64) -> Self {
        Self { current: Sentiment::NEUTRAL, last_updated: ts }
    }
}

/// Full market snapshot pushed to streaming subscribers on every commit.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub sentiment: Sentiment,
    pub last_updated: u64,
    pub mint_price: Price,
    pub rarity: Rarity,
    pub tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub ts: u64,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub ts: u64,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityKind {
    Minted {
        id: TokenId,
        owner: String,
        sentiment: Sentiment,
        price: Price,
    },
    Evolved {
        id: TokenId,
        sentiment: Sentiment,
        from: Rarity,
        to: Rarity,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub minted: u64,
    pub floor_price: Price,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_boundary_sleep() {
        let mut cfg = Config::from_env();
        cfg.refresh_secs = 30;
        assert_eq!(cfg.sleep_until_next_refresh(0), 30);
        assert_eq!(cfg.sleep_until_next_refresh(29), 1);
        assert_eq!(cfg.sleep_until_next_refresh(30), 30);
        assert_eq!(cfg.sleep_until_next_refresh(31), 29);
    }

    #[test]
    fn neutral_state_default() {
        let g = GlobalSentimentState::neutral(42);
        assert_eq!(g.current, Sentiment::NEUTRAL);
        assert_eq!(g.last_updated, 42);
    }
}
