//! The sentiment ledger: owns the global sentiment singleton and every
//! minted token record, and propagates sentiment updates to all of them.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::errors::MarketError;
use crate::policy::{mint_price, rarity_of, Rarity, Sentiment};
use crate::state::{
    ActivityEntry, ActivityKind, CollectionStats, Config, GlobalSentimentState, MarketSnapshot,
    SentimentPoint, TokenId, TokenRecord,
};

/// A token whose rarity tier changed during a sentiment update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evolution {
    pub id: TokenId,
    pub sentiment: Sentiment,
    pub from: Rarity,
    pub to: Rarity,
}

/// Provenance view of a single token: sentiment at mint vs now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvolutionReport {
    pub original: Sentiment,
    pub current: Sentiment,
    pub delta: i32,
}

pub struct SentimentLedger {
    global: GlobalSentimentState,
    tokens: BTreeMap<TokenId, TokenRecord>,
    next_id: u64,
    history: VecDeque<SentimentPoint>,
    activity: VecDeque<ActivityEntry>,
    history_cap: usize,
    activity_cap: usize,
}

impl SentimentLedger {
    pub fn new(cfg: &Config, genesis_ts: u64) -> Self {
        let global = GlobalSentimentState::neutral(genesis_ts);
        let mut ledger = Self {
            global,
            tokens: BTreeMap::new(),
            next_id: 1,
            history: VecDeque::new(),
            activity: VecDeque::new(),
            history_cap: cfg.history_max_points.max(1),
            activity_cap: cfg.activity_max_entries.max(1),
        };
        ledger.push_history(SentimentPoint { ts: genesis_ts, sentiment: global.current });
        ledger
    }

    pub fn global(&self) -> GlobalSentimentState {
        self.global
    }

    /// Apply a new global sentiment, already range-validated by the caller.
    ///
    /// Every record is rewritten before the global value itself, so a reader
    /// that observes the new global sentiment can never find a stale record.
    /// Returns one `Evolution` per record whose tier actually changed.
    /// Re-applying the current value is a no-op: no events, no history point,
    /// `last_updated` untouched.
    pub fn apply_update(&mut self, new: Sentiment, ts: u64) -> Vec<Evolution> {
        if new == self.global.current {
            return Vec::new();
        }

        let mut evolutions = Vec::new();
        for record in self.tokens.values_mut() {
            record.current_sentiment = new;
            let tier = rarity_of(new);
            if tier != record.rarity {
                evolutions.push(Evolution {
                    id: record.id,
                    sentiment: new,
                    from: record.rarity,
                    to: tier,
                });
                record.rarity = tier;
            }
        }
        self.global = GlobalSentimentState { current: new, last_updated: ts };

        for evo in &evolutions {
            self.push_activity(ActivityEntry {
                ts,
                kind: ActivityKind::Evolved {
                    id: evo.id,
                    sentiment: evo.sentiment,
                    from: evo.from,
                    to: evo.to,
                },
            });
        }
        self.push_history(SentimentPoint { ts, sentiment: new });
        evolutions
    }

    /// Identifier the next minted token will receive. Does not advance.
    pub fn next_token_id(&self) -> TokenId {
        TokenId(self.next_id)
    }

    /// Insert a freshly minted record and append its activity entry.
    pub fn insert(&mut self, record: TokenRecord) {
        self.next_id = self.next_id.max(record.id.0 + 1);
        self.push_activity(ActivityEntry {
            ts: record.mint_ts,
            kind: ActivityKind::Minted {
                id: record.id,
                owner: record.owner.clone(),
                sentiment: record.mint_sentiment,
                price: record.mint_price,
            },
        });
        self.tokens.insert(record.id, record);
    }

    pub fn record_of(&self, id: TokenId) -> Result<&TokenRecord, MarketError> {
        self.tokens.get(&id).ok_or(MarketError::NotFound(id))
    }

    pub fn evolution_of(&self, id: TokenId) -> Result<EvolutionReport, MarketError> {
        let record = self.record_of(id)?;
        Ok(EvolutionReport {
            original: record.mint_sentiment,
            current: record.current_sentiment,
            delta: record.current_sentiment.value() as i32 - record.mint_sentiment.value() as i32,
        })
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            sentiment: self.global.current,
            last_updated: self.global.last_updated,
            mint_price: mint_price(self.global.current),
            rarity: rarity_of(self.global.current),
            tokens: self.tokens.len(),
        }
    }

    /// Sentiment series over the trailing `hours`, oldest first.
    pub fn history(&self, hours: u64, now: u64) -> Vec<SentimentPoint> {
        let cutoff = now.saturating_sub(hours.saturating_mul(3_600));
        self.history.iter().filter(|p| p.ts >= cutoff).copied().collect()
    }

    pub fn history_points(&self) -> Vec<SentimentPoint> {
        self.history.iter().copied().collect()
    }

    /// Most recent activity first, bounded by `limit`.
    pub fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        self.activity.iter().rev().take(limit).cloned().collect()
    }

    /// Collections ranked by mint count, bounded by `limit`.
    pub fn top_collections(&self, limit: usize) -> Vec<CollectionStats> {
        let mut by_name: BTreeMap<&str, CollectionStats> = BTreeMap::new();
        for record in self.tokens.values() {
            let entry = by_name
                .entry(record.collection.as_str())
                .or_insert_with(|| CollectionStats {
                    name: record.collection.clone(),
                    minted: 0,
                    floor_price: record.mint_price,
                });
            entry.minted += 1;
            entry.floor_price = entry.floor_price.min(record.mint_price);
        }
        let mut stats: Vec<CollectionStats> = by_name.into_values().collect();
        stats.sort_by(|a, b| b.minted.cmp(&a.minted).then_with(|| a.name.cmp(&b.name)));
        stats.truncate(limit);
        stats
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn push_history(&mut self, point: SentimentPoint) {
        self.history.push_back(point);
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    fn push_activity(&mut self, entry: ActivityEntry) {
        self.activity.push_back(entry);
        while self.activity.len() > self.activity_cap {
            self.activity.pop_front();
        }
    }
}
