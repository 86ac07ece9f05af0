//! Mint coordination: price validation, record creation, refunds.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::errors::MarketError;
use crate::ledger::SentimentLedger;
use crate::policy::{mint_price, rarity_of, Price};
use crate::settlement::{Settlement, SettlementOp};
use crate::state::TokenRecord;

#[derive(Debug, Clone)]
pub struct MintRequest {
    pub to: String,
    pub collection: String,
    pub metadata_uri: String,
    pub attributes: BTreeMap<String, String>,
    pub payment: Price,
}

#[derive(Debug, Clone, Serialize)]
pub struct MintOutcome {
    pub token: TokenRecord,
    pub paid: Price,
    pub refund: Price,
    pub tx_id: String,
}

/// Mint a token at the current global sentiment.
///
/// The required price is computed from the ledger's current sentiment; a
/// payment below it aborts with `InsufficientPayment` before any settlement
/// or ledger mutation. Overpayment is returned as the refund. The record's
/// `mint_sentiment`, `current_sentiment` and rarity are all fixed from the
/// same sentiment read, so the invariants hold at insertion.
pub fn mint(
    req: MintRequest,
    ts: u64,
    ledger: &mut SentimentLedger,
    settlement: &mut dyn Settlement,
) -> Result<MintOutcome> {
    let sentiment = ledger.global().current;
    let required = mint_price(sentiment);
    if req.payment < required {
        return Err(MarketError::InsufficientPayment { required, offered: req.payment }.into());
    }
    // Exact by the check above.
    let refund = req.payment.checked_sub(required).unwrap_or(Price::ZERO);

    let id = ledger.next_token_id();
    let receipt = settlement.commit(&SettlementOp::Mint {
        id,
        to: req.to.clone(),
        price: required,
        ts,
    })?;

    let token = TokenRecord {
        id,
        owner: req.to,
        collection: req.collection,
        metadata_uri: req.metadata_uri,
        mint_sentiment: sentiment,
        current_sentiment: sentiment,
        rarity: rarity_of(sentiment),
        mint_ts: ts,
        mint_price: required,
        attributes: req.attributes,
    };
    ledger.insert(token.clone());

    Ok(MintOutcome { token, paid: required, refund, tx_id: receipt.tx_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Rarity, Sentiment};
    use crate::settlement::mock::MockSettlement;
    use crate::state::Config;

    fn setup() -> (SentimentLedger, MockSettlement) {
        (SentimentLedger::new(&Config::from_env(), 0), MockSettlement::with_seed(1, 0))
    }

    fn request(payment_pips: u64) -> MintRequest {
        MintRequest {
            to: "alice".to_string(),
            collection: "waves".to_string(),
            metadata_uri: "ipfs://meta/1".to_string(),
            attributes: BTreeMap::new(),
            payment: Price::from_pips(payment_pips),
        }
    }

    #[test]
    fn exact_payment_mints_with_zero_refund() {
        let (mut ledger, mut settlement) = setup();
        let outcome = mint(request(3_825), 1, &mut ledger, &mut settlement).unwrap();
        assert_eq!(outcome.refund, Price::ZERO);
        assert_eq!(outcome.paid.pips(), 3_825);
        assert_eq!(outcome.token.rarity, Rarity::Rare);
        assert_eq!(outcome.token.mint_sentiment, Sentiment::NEUTRAL);
        assert_eq!(ledger.token_count(), 1);
        assert!(outcome.tx_id.starts_with("0x"));
    }

    #[test]
    fn underpayment_rejected_without_mutation() {
        let (mut ledger, mut settlement) = setup();
        let err = mint(request(3_824), 1, &mut ledger, &mut settlement).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MarketError>(),
            Some(&MarketError::InsufficientPayment {
                required: Price::from_pips(3_825),
                offered: Price::from_pips(3_824),
            })
        );
        assert_eq!(ledger.token_count(), 0);
        assert!(ledger.recent_activity(10).is_empty());
    }

    #[test]
    fn overpayment_refunds_excess() {
        let (mut ledger, mut settlement) = setup();
        let outcome = mint(request(5_000), 1, &mut ledger, &mut settlement).unwrap();
        assert_eq!(outcome.paid.pips(), 3_825);
        assert_eq!(outcome.refund.pips(), 1_175);
    }

    #[test]
    fn ids_unique_and_monotonic() {
        let (mut ledger, mut settlement) = setup();
        let a = mint(request(10_000), 1, &mut ledger, &mut settlement).unwrap();
        let b = mint(request(10_000), 2, &mut ledger, &mut settlement).unwrap();
        assert!(b.token.id > a.token.id);
    }

    #[test]
    fn price_follows_sentiment_at_mint_time() {
        let (mut ledger, mut settlement) = setup();
        ledger.apply_update(Sentiment::new(900).unwrap(), 1);
        // price(900) = (1000 + 49*900) * (10000 + 10*900) / 100000 = 8569 pips
        let err = mint(request(3_825), 2, &mut ledger, &mut settlement).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MarketError>(),
            Some(MarketError::InsufficientPayment { .. })
        ));
        let outcome = mint(request(9_000), 3, &mut ledger, &mut settlement).unwrap();
        assert_eq!(outcome.paid.pips(), 8_569);
        assert_eq!(outcome.refund.pips(), 431);
        assert_eq!(outcome.token.rarity, Rarity::Legendary);
    }
}
