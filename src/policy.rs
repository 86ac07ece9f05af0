//! Pure pricing and rarity policies over the canonical sentiment scale.
//!
//! Everything here is integer fixed-point so the mock and chain settlement
//! backends reproduce identical numbers bit for bit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MarketError;

/// Upper bound of the canonical sentiment scale (0 = max fear, 1000 = max greed).
pub const SENTIMENT_SCALE: u16 = 1000;

/// Neutral contribution used when an upstream source fails, as a real fraction.
pub const NEUTRAL_FRACTION: f64 = 0.5;

/// Market sentiment as a canonical integer in [0, 1000].
///
/// Scaled from a real-valued fraction in [0.0, 1.0]; the integral form is
/// the only representation that crosses module boundaries, so there is no
/// floating-point drift between settlement backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sentiment(u16);

impl Sentiment {
    pub const NEUTRAL: Sentiment = Sentiment(500);

    pub fn new(raw: u16) -> Result<Self, MarketError> {
        if raw > SENTIMENT_SCALE {
            return Err(MarketError::OutOfRangeSentiment { value: raw as i64 });
        }
        Ok(Self(raw))
    }

    /// Scale a real-valued fraction in [0.0, 1.0] to the canonical integer form.
    pub fn from_fraction(fraction: f64) -> Result<Self, MarketError> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(MarketError::OutOfRangeSentiment {
                value: (fraction * SENTIMENT_SCALE as f64) as i64,
            });
        }
        Ok(Self((fraction * SENTIMENT_SCALE as f64).round() as u16))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary amount in 1e-4 fixed-point units ("pips").
///
/// 1 pip = 0.0001; Display renders four decimals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_pips(pips: u64) -> Self {
        Self(pips)
    }

    pub fn pips(self) -> u64 {
        self.0
    }

    pub fn checked_sub(self, other: Price) -> Option<Price> {
        self.0.checked_sub(other.0).map(Price)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / 10_000, self.0 % 10_000)
    }
}

/// Rarity tier, totally ordered by the sentiment thresholds below.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    UltraRare,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::UltraRare => "ultra_rare",
            Rarity::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mint price for a given sentiment.
///
/// Exact integer form of: base ramps 0.01 → 0.50 across the scale, the
/// multiplier ramps 1.0 → 2.0, price = base * multiplier truncated to pips.
///   base_e5  = 1_000 + 49 * s      (base scaled by 1e5, exact)
///   mult_e4  = 10_000 + 10 * s     (multiplier scaled by 1e4, exact)
///   pips     = base_e5 * mult_e4 / 100_000
/// Reference points: price(0) = 0.0100, price(500) = 0.3825, price(1000) = 1.0000.
/// Strictly increasing: the product grows by at least 490_000 per unit step,
/// above the truncating divisor.
pub fn mint_price(sentiment: Sentiment) -> Price {
    let s = sentiment.value() as u64;
    let base_e5 = 1_000 + 49 * s;
    let mult_e4 = 10_000 + 10 * s;
    Price(base_e5 * mult_e4 / 100_000)
}

/// Rarity classification. Pure and total over the canonical scale.
pub fn rarity_of(sentiment: Sentiment) -> Rarity {
    match sentiment.value() {
        0..=400 => Rarity::Common,
        401..=600 => Rarity::Rare,
        601..=800 => Rarity::UltraRare,
        _ => Rarity::Legendary,
    }
}
