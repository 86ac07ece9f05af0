use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Settlement, SettlementOp, TxReceipt};
use crate::state::Config;

/// Simulated settlement: no real chain, no persistence.
///
/// Identifiers come from an injected seeded RNG, never a global generator,
/// so a fixed `MOCK_SEED` yields a reproducible id sequence. The optional
/// commit delay imitates settlement latency; tests run with 0.
pub struct MockSettlement {
    rng: StdRng,
    delay_ms: u64,
}

impl MockSettlement {
    pub fn new(cfg: &Config) -> Self {
        Self::with_seed(cfg.mock_seed, cfg.mock_delay_ms)
    }

    pub fn with_seed(seed: u64, delay_ms: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), delay_ms }
    }

    fn hex_bytes(&mut self, len: usize) -> String {
        let mut buf = vec![0u8; len];
        self.rng.fill(&mut buf[..]);
        hex::encode(buf)
    }

    /// Wallet-address-shaped string for simulated participants.
    pub fn wallet_address(&mut self) -> String {
        format!("0x{}", self.hex_bytes(20))
    }
}

impl Settlement for MockSettlement {
    fn commit(&mut self, op: &SettlementOp) -> Result<TxReceipt> {
        if self.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
        }
        Ok(TxReceipt { tx_id: format!("0x{}", self.hex_bytes(32)), ts: op.ts() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Sentiment;

    fn update_op(ts: u64) -> SettlementOp {
        SettlementOp::SentimentUpdate { sentiment: Sentiment::new(700).unwrap(), ts }
    }

    #[test]
    fn same_seed_same_tx_sequence() {
        let mut a = MockSettlement::with_seed(42, 0);
        let mut b = MockSettlement::with_seed(42, 0);
        for ts in 0..5 {
            let ra = a.commit(&update_op(ts)).unwrap();
            let rb = b.commit(&update_op(ts)).unwrap();
            assert_eq!(ra.tx_id, rb.tx_id);
        }
    }

    #[test]
    fn different_seed_different_ids() {
        let mut a = MockSettlement::with_seed(1, 0);
        let mut b = MockSettlement::with_seed(2, 0);
        assert_ne!(a.commit(&update_op(0)).unwrap().tx_id, b.commit(&update_op(0)).unwrap().tx_id);
    }

    #[test]
    fn identifier_shapes() {
        let mut m = MockSettlement::with_seed(9, 0);
        let addr = m.wallet_address();
        assert!(addr.starts_with("0x"));
        assert_eq!(addr.len(), 42);
        let receipt = m.commit(&update_op(5)).unwrap();
        assert!(receipt.tx_id.starts_with("0x"));
        assert_eq!(receipt.tx_id.len(), 66);
        assert_eq!(receipt.ts, 5);
    }
}
