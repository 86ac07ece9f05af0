//! Upstream sentiment aggregation for the periodic refresh task.
//!
//! Each source produces a fraction in [0.0, 1.0]. A source that errors or
//! exceeds the per-source timeout contributes the neutral 0.5 instead of
//! failing the cycle; the failure is logged and absorbed here.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use std::sync::Mutex;
use tokio::time::{timeout, Duration};

use crate::errors::MarketError;
use crate::logging::{json_log, log, obj, v_num, v_str, Level};
use crate::policy::NEUTRAL_FRACTION;
use crate::state::Config;

#[async_trait]
pub trait SentimentSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self) -> Result<f64>;
}

/// Fear-and-greed style HTTP index. Accepts either a bare fraction or a
/// 0-100 index value, at the top level or under `data[0].value`.
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str) -> Self {
        Self { client: Client::new(), url: url.to_string() }
    }

    fn extract_value(body: &serde_json::Value) -> Option<f64> {
        let raw = body
            .get("value")
            .or_else(|| body.pointer("/data/0/value"))?;
        match raw {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn normalize(value: f64) -> f64 {
        // Index feeds report 0-100; fraction feeds report 0-1.
        let fraction = if value > 1.0 { value / 100.0 } else { value };
        fraction.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl SentimentSource for HttpSource {
    fn name(&self) -> &'static str {
        "http_index"
    }

    async fn fetch(&self) -> Result<f64> {
        let body: serde_json::Value =
            self.client.get(&self.url).send().await?.error_for_status()?.json().await?;
        let value = Self::extract_value(&body)
            .ok_or_else(|| anyhow!("no sentiment value in response from {}", self.url))?;
        Ok(Self::normalize(value))
    }
}

/// Deterministic bounded random walk, used when no live feed is configured
/// and as a second opinion alongside one.
pub struct SyntheticSource {
    state: Mutex<(StdRng, f64)>,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self { state: Mutex::new((StdRng::seed_from_u64(seed), NEUTRAL_FRACTION)) }
    }
}

#[async_trait]
impl SentimentSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic_walk"
    }

    async fn fetch(&self) -> Result<f64> {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let (rng, last) = &mut *guard;
        let step: f64 = rng.gen_range(-0.05..=0.05);
        *last = (*last + step).clamp(0.0, 1.0);
        Ok(*last)
    }
}

pub struct Aggregator {
    sources: Vec<Box<dyn SentimentSource>>,
    per_source_timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Box<dyn SentimentSource>>, timeout_ms: u64) -> Self {
        Self { sources, per_source_timeout: Duration::from_millis(timeout_ms) }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let mut sources: Vec<Box<dyn SentimentSource>> = Vec::new();
        if let Some(url) = &cfg.feed_url {
            sources.push(Box::new(HttpSource::new(url)));
        }
        sources.push(Box::new(SyntheticSource::new(cfg.feed_seed)));
        Self::new(sources, cfg.source_timeout_ms)
    }

    /// Mean of all source readings as a fraction in [0.0, 1.0].
    ///
    /// Never fails: a failed or timed-out source contributes the neutral
    /// 0.5, and an empty source list reads as neutral outright.
    pub async fn read(&self) -> f64 {
        if self.sources.is_empty() {
            return NEUTRAL_FRACTION;
        }
        let mut total = 0.0;
        for source in &self.sources {
            total += match timeout(self.per_source_timeout, source.fetch()).await {
                Ok(Ok(value)) => {
                    let clamped = value.clamp(0.0, 1.0);
                    json_log(
                        "feed",
                        obj(&[("source", v_str(source.name())), ("value", v_num(clamped))]),
                    );
                    clamped
                }
                Ok(Err(err)) => {
                    self.absorb(MarketError::TransientSourceFailure {
                        source: source.name().to_string(),
                        reason: err.to_string(),
                    });
                    NEUTRAL_FRACTION
                }
                Err(_) => {
                    self.absorb(MarketError::TransientSourceFailure {
                        source: source.name().to_string(),
                        reason: format!("timed out after {:?}", self.per_source_timeout),
                    });
                    NEUTRAL_FRACTION
                }
            };
        }
        total / self.sources.len() as f64
    }

    fn absorb(&self, failure: MarketError) {
        log(
            Level::Warn,
            "feed",
            obj(&[("event", v_str("source_fallback")), ("error", v_str(&failure.to_string()))]),
        );
    }
}
