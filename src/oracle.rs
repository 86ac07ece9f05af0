//! The oracle gateway: the single authorized write path for sentiment.

use anyhow::Result;
use serde::Serialize;

use crate::errors::MarketError;
use crate::ledger::{Evolution, SentimentLedger};
use crate::policy::Sentiment;
use crate::settlement::{Settlement, SettlementOp};

/// Outcome of a committed sentiment update, for observability and indexing.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReceipt {
    pub tx_id: String,
    pub sentiment: Sentiment,
    pub evolutions: Vec<Evolution>,
}

pub struct OracleGateway {
    oracle_id: String,
    owner_id: String,
}

impl OracleGateway {
    pub fn new(oracle_id: &str, owner_id: &str) -> Self {
        Self { oracle_id: oracle_id.to_string(), owner_id: owner_id.to_string() }
    }

    fn authorize(&self, caller: &str) -> Result<(), MarketError> {
        if caller != self.oracle_id && caller != self.owner_id {
            return Err(MarketError::Unauthorized { caller: caller.to_string() });
        }
        Ok(())
    }

    /// Validate, settle, then apply a sentiment update.
    ///
    /// Authorization and range validation happen before anything else, so a
    /// rejected call leaves ledger state untouched. The settlement commit
    /// precedes the ledger mutation for the same reason: a failed commit
    /// aborts with no partial application.
    pub fn update(
        &self,
        caller: &str,
        fraction: f64,
        ts: u64,
        ledger: &mut SentimentLedger,
        settlement: &mut dyn Settlement,
    ) -> Result<UpdateReceipt> {
        self.authorize(caller)?;
        let sentiment = Sentiment::from_fraction(fraction)?;
        let receipt = settlement.commit(&SettlementOp::SentimentUpdate { sentiment, ts })?;
        let evolutions = ledger.apply_update(sentiment, ts);
        Ok(UpdateReceipt { tx_id: receipt.tx_id, sentiment, evolutions })
    }
}
