//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ConsensusSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `CONSENSUS_*` environment overrides (highest priority)
//!
//! Validation is left to the caller, which may still apply CLI flags.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ConsensusSettings;

pub const DEFAULT_SETTINGS_FILE: &str = "consensus.json";

/// The settings file in the working directory.
pub fn settings_path() -> PathBuf {
    PathBuf::from(DEFAULT_SETTINGS_FILE)
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ConsensusSettings> {
    let defaults = serde_json::to_value(ConsensusSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ConsensusSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, everything else is replaced by `source`, and
/// nulls in `source` keep the target value.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

pub fn apply_env_overrides(settings: &mut ConsensusSettings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Apply overrides from `lookup`. Invalid values are ignored with a warning.
pub fn apply_overrides<F>(settings: &mut ConsensusSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = string("CONSENSUS_OLLAMA_URL") {
        settings.ollama_url = v;
    }
    if let Some(v) = string("CONSENSUS_MODEL1") {
        settings.model1 = v;
    }
    if let Some(v) = string("CONSENSUS_MODEL2") {
        settings.model2 = v;
    }
    if let Some(v) = string("CONSENSUS_MAX_TURNS") {
        match parse_u64_range(&v, 0, 100_000) {
            Some(n) => settings.max_turns = n as u32,
            None => warn!(key = "CONSENSUS_MAX_TURNS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = string("CONSENSUS_DETECTION") {
        match v.parse() {
            Ok(detection) => settings.consensus_detection = detection,
            Err(e) => warn!(key = "CONSENSUS_DETECTION", value = %v, error = %e, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = string("CONSENSUS_IDLE_TIMEOUT_SECS") {
        match parse_u64_range(&v, 0, 86_400) {
            Some(n) => settings.idle_timeout_secs = n,
            None => warn!(key = "CONSENSUS_IDLE_TIMEOUT_SECS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = string("CONSENSUS_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
