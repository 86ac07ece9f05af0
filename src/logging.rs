//! Structured JSON-line logging.
//!
//! One JSON object per line on stdout: timestamp, monotonic sequence,
//! level, component, then the event fields. `LOG_LEVEL` gates verbosity.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Emit a structured log entry at an explicit level.
pub fn log(level: Level, component: &str, fields: Map<String, Value>) {
    if level < Level::from_env() {
        return;
    }
    let mut entry = Map::new();
    entry.insert("ts".to_string(), Value::String(ts_now()));
    entry.insert("seq".to_string(), Value::from(next_seq()));
    entry.insert("lvl".to_string(), Value::String(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), Value::String(component.to_string()));
    for (k, v) in fields {
        entry.insert(k, v);
    }
    println!("{}", Value::Object(entry));
}

/// Info-level structured log entry.
pub fn json_log(component: &str, fields: Map<String, Value>) {
    log(Level::Info, component, fields);
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), value.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    serde_json::json!(n)
}

pub fn v_u64(n: u64) -> Value {
    Value::from(n)
}
