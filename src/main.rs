use anyhow::Result;
use tokio::time::{sleep, Duration};

use sentimint::feed::Aggregator;
use sentimint::logging::{json_log, log, obj, v_num, v_str, v_u64, Level};
use sentimint::service::MarketService;
use sentimint::settlement::SettlementKind;
use sentimint::state::{now_ts, Config};
use sentimint::storage::SettlementStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let kind = SettlementKind::from_env();
    let settlement = kind.build(&cfg)?;
    json_log(
        "system",
        obj(&[
            ("event", v_str("start")),
            ("settlement", v_str(kind.as_str())),
            ("refresh_secs", v_u64(cfg.refresh_secs)),
            ("oracle_id", v_str(&cfg.oracle_id)),
        ]),
    );

    let service = MarketService::new(&cfg, settlement);
    let aggregator = Aggregator::from_config(&cfg);
    let mut store = SettlementStore::open(&cfg.sqlite_path)?;
    store.init()?;
    let restored = store.load_history(now_ts().saturating_sub(86_400))?;
    if !restored.is_empty() {
        json_log(
            "system",
            obj(&[
                ("event", v_str("history_restored")),
                ("points", v_u64(restored.len() as u64)),
            ]),
        );
    }
    let mut last_persist: u64 = 0;

    loop {
        let start = now_ts();

        // The refresh task is just another oracle caller; it holds no
        // privilege beyond the oracle identity.
        let fraction = aggregator.read().await;
        match service.oracle_update(&cfg.oracle_id, fraction) {
            Ok(receipt) => {
                if !receipt.evolutions.is_empty() {
                    json_log(
                        "system",
                        obj(&[
                            ("event", v_str("refresh_evolved")),
                            ("count", v_u64(receipt.evolutions.len() as u64)),
                            ("tx_id", v_str(&receipt.tx_id)),
                        ]),
                    );
                }
            }
            Err(err) => {
                // A rejected update never kills the refresh cycle.
                log(
                    Level::Error,
                    "system",
                    obj(&[("event", v_str("refresh_failed")), ("error", v_str(&err.to_string()))]),
                );
            }
        }

        let snap = service.snapshot();
        json_log(
            "market",
            obj(&[
                ("sentiment", v_u64(snap.sentiment.value() as u64)),
                ("mint_price", v_num(snap.mint_price.pips() as f64 / 10_000.0)),
                ("rarity", v_str(snap.rarity.as_str())),
                ("tokens", v_u64(snap.tokens as u64)),
            ]),
        );

        if start.saturating_sub(last_persist) >= cfg.persist_every_secs {
            store.persist_history(&service.history_points())?;
            last_persist = start;
        }

        let sleep_for = cfg.sleep_until_next_refresh(start);
        sleep(Duration::from_secs(sleep_for)).await;
    }
}
