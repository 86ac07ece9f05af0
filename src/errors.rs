use thiserror::Error;

use crate::policy::Price;
use crate::state::TokenId;

/// Domain failures surfaced to mint and oracle callers.
///
/// Read-only queries never return these for data reasons; they yield
/// defaults or empty collections instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("caller `{caller}` is not the oracle or the owner")]
    Unauthorized { caller: String },

    #[error("sentiment {value} outside [0, 1000]")]
    OutOfRangeSentiment { value: i64 },

    #[error("payment {offered} below required mint price {required}")]
    InsufficientPayment { required: Price, offered: Price },

    #[error("unknown token {0}")]
    NotFound(TokenId),

    #[error("sentiment source `{source}` failed: {reason}")]
    TransientSourceFailure { r#source: String, reason: String },
}
