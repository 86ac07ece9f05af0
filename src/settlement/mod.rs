//! Settlement backends: where a committed operation "lands".
//!
//! The mock backend simulates settlement with randomized identifiers and an
//! optional artificial delay; the chain backend journals every operation and
//! derives deterministic transaction hashes. Both sit behind the same trait,
//! selected by configuration, so the pricing/rarity engine above them is a
//! single implementation with no drift risk.

use anyhow::Result;

use crate::policy::{Price, Sentiment};
use crate::state::{Config, TokenId};

pub mod chain;
pub mod mock;

#[derive(Clone, Copy, Debug)]
pub enum SettlementKind {
    Mock,
    Chain,
}

impl SettlementKind {
    pub fn from_env() -> Self {
        match std::env::var("SETTLEMENT").unwrap_or_else(|_| "mock".to_string()).as_str() {
            "chain" => SettlementKind::Chain,
            _ => SettlementKind::Mock,
        }
    }

    pub fn build(self, cfg: &Config) -> Result<Box<dyn Settlement + Send>> {
        match self {
            SettlementKind::Mock => Ok(Box::new(mock::MockSettlement::new(cfg))),
            SettlementKind::Chain => Ok(Box::new(chain::ChainSettlement::open(&cfg.sqlite_path)?)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementKind::Mock => "mock",
            SettlementKind::Chain => "chain",
        }
    }
}

/// A mutation to be settled: a global sentiment update or a token mint.
#[derive(Debug, Clone)]
pub enum SettlementOp {
    SentimentUpdate { sentiment: Sentiment, ts: u64 },
    Mint { id: TokenId, to: String, price: Price, ts: u64 },
}

impl SettlementOp {
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementOp::SentimentUpdate { .. } => "update",
            SettlementOp::Mint { .. } => "mint",
        }
    }

    pub fn ts(&self) -> u64 {
        match self {
            SettlementOp::SentimentUpdate { ts, .. } => *ts,
            SettlementOp::Mint { ts, .. } => *ts,
        }
    }

    /// Stable textual form used for journaling and tx-hash derivation.
    pub fn canonical(&self) -> String {
        match self {
            SettlementOp::SentimentUpdate { sentiment, ts } => {
                format!("update:{}:{}", sentiment.value(), ts)
            }
            SettlementOp::Mint { id, to, price, ts } => {
                format!("mint:{}:{}:{}:{}", id, to, price.pips(), ts)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_id: String,
    pub ts: u64,
}

/// One settled operation at a time; a failed commit leaves no engine state
/// behind because callers commit before mutating the ledger.
pub trait Settlement {
    fn commit(&mut self, op: &SettlementOp) -> Result<TxReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms_stable() {
        let update = SettlementOp::SentimentUpdate {
            sentiment: Sentiment::new(900).unwrap(),
            ts: 7,
        };
        assert_eq!(update.canonical(), "update:900:7");
        assert_eq!(update.kind(), "update");

        let mint = SettlementOp::Mint {
            id: TokenId(3),
            to: "alice".to_string(),
            price: Price::from_pips(3_825),
            ts: 9,
        };
        assert_eq!(mint.canonical(), "mint:3:alice:3825:9");
        assert_eq!(mint.kind(), "mint");
        assert_eq!(mint.ts(), 9);
    }
}
