//! Composition root: one ledger, one settlement backend, one streaming
//! channel. This is the surface the presentation layer calls into.

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use tokio::sync::broadcast;

use crate::errors::MarketError;
use crate::ledger::{EvolutionReport, SentimentLedger};
use crate::logging::{json_log, obj, v_num, v_str, v_u64};
use crate::mint::{self, MintOutcome, MintRequest};
use crate::oracle::{OracleGateway, UpdateReceipt};
use crate::settlement::Settlement;
use crate::state::{
    now_ts, ActivityEntry, CollectionStats, Config, MarketSnapshot, SentimentPoint, TokenId,
    TokenRecord,
};

struct Inner {
    ledger: SentimentLedger,
    settlement: Box<dyn Settlement + Send>,
}

pub struct MarketService {
    inner: Mutex<Inner>,
    oracle: OracleGateway,
    snapshots: broadcast::Sender<MarketSnapshot>,
}

impl MarketService {
    pub fn new(cfg: &Config, settlement: Box<dyn Settlement + Send>) -> Self {
        let (snapshots, _) = broadcast::channel(cfg.snapshot_channel_capacity.max(1));
        Self {
            inner: Mutex::new(Inner {
                ledger: SentimentLedger::new(cfg, now_ts()),
                settlement,
            }),
            oracle: OracleGateway::new(&cfg.oracle_id, &cfg.owner_id),
            snapshots,
        }
    }

    /// Subscribe to full post-commit market snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<MarketSnapshot> {
        self.snapshots.subscribe()
    }

    // Mutations hold the lock across validate, settle and apply, so a mint
    // can never interleave with a sentiment propagation and readers observe
    // either the pre- or the post-commit state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push a sentiment update through the oracle path.
    pub fn oracle_update(&self, caller: &str, fraction: f64) -> Result<UpdateReceipt> {
        let ts = now_ts();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let receipt =
            self.oracle.update(caller, fraction, ts, &mut inner.ledger, inner.settlement.as_mut())?;
        for evo in &receipt.evolutions {
            json_log(
                "ledger",
                obj(&[
                    ("event", v_str("evolved")),
                    ("token", v_u64(evo.id.0)),
                    ("sentiment", v_u64(evo.sentiment.value() as u64)),
                    ("from", v_str(evo.from.as_str())),
                    ("to", v_str(evo.to.as_str())),
                ]),
            );
        }
        let snap = inner.ledger.snapshot();
        drop(guard);
        json_log(
            "oracle",
            obj(&[
                ("event", v_str("updated")),
                ("tx_id", v_str(&receipt.tx_id)),
                ("sentiment", v_u64(receipt.sentiment.value() as u64)),
                ("evolved", v_u64(receipt.evolutions.len() as u64)),
            ]),
        );
        let _ = self.snapshots.send(snap);
        Ok(receipt)
    }

    /// Mint a token against the current sentiment and price.
    pub fn mint(&self, req: MintRequest) -> Result<MintOutcome> {
        let ts = now_ts();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let outcome = mint::mint(req, ts, &mut inner.ledger, inner.settlement.as_mut())?;
        drop(guard);
        json_log(
            "mint",
            obj(&[
                ("event", v_str("minted")),
                ("token", v_u64(outcome.token.id.0)),
                ("owner", v_str(&outcome.token.owner)),
                ("sentiment", v_u64(outcome.token.mint_sentiment.value() as u64)),
                ("price", v_num(outcome.paid.pips() as f64 / 10_000.0)),
                ("refund", v_num(outcome.refund.pips() as f64 / 10_000.0)),
                ("tx_id", v_str(&outcome.tx_id)),
            ]),
        );
        Ok(outcome)
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        self.lock().ledger.snapshot()
    }

    pub fn history(&self, hours: u64) -> Vec<SentimentPoint> {
        self.lock().ledger.history(hours, now_ts())
    }

    pub fn history_points(&self) -> Vec<SentimentPoint> {
        self.lock().ledger.history_points()
    }

    pub fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        self.lock().ledger.recent_activity(limit)
    }

    pub fn top_collections(&self, limit: usize) -> Vec<CollectionStats> {
        self.lock().ledger.top_collections(limit)
    }

    pub fn token(&self, id: TokenId) -> Result<TokenRecord, MarketError> {
        self.lock().ledger.record_of(id).cloned()
    }

    pub fn evolution(&self, id: TokenId) -> Result<EvolutionReport, MarketError> {
        self.lock().ledger.evolution_of(id)
    }
}
