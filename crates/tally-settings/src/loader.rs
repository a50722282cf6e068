//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tally_logging::LogFormat;
use tracing::debug;

use crate::errors::Result;
use crate::types::TallySettings;

/// Resolve the path to the settings file (`~/.tally/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tally").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a merged result that
/// fails [`TallySettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TallySettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<TallySettings> {
    let defaults = serde_json::to_value(TallySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `TALLY_*` environment overrides.
pub fn apply_env_overrides(settings: &mut TallySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Each variable is parsed strictly; invalid values are logged and ignored.
pub fn apply_overrides_from(settings: &mut TallySettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("TALLY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("TALLY_PORT", |s| parse_range::<u16>(s, 0, u16::MAX)) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("TALLY_DISPATCH_QUEUE", |s| parse_range(s, 1, 1_000_000)) {
        settings.server.dispatch_queue_capacity = v;
    }
    if let Some(v) = env.parsed("TALLY_SEND_QUEUE", |s| parse_range(s, 1, 100_000)) {
        settings.server.max_send_queue = v;
    }
    if let Some(v) = env.parsed("TALLY_MAX_FRAME_ERRORS", |s| parse_range(s, 1, 10_000)) {
        settings.server.max_consecutive_frame_errors = v;
    }

    // ── Catalog ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TALLY_CATALOG_PATH") {
        settings.catalog.path = PathBuf::from(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TALLY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed("TALLY_LOG_FORMAT", |s| s.parse::<LogFormat>().ok()) {
        settings.logging.format = v;
    }
    if let Some(v) = env.parsed("TALLY_LOG_ANSI", parse_bool) {
        settings.logging.ansi = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an integer within an inclusive range.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_file_layer(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s, TallySettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 7000, "host": null}, "logging": {"format": "compact"}}"#,
        )
        .unwrap();
        let s = load_file_layer(&path).unwrap();
        assert_eq!(s.server.port, 7000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.logging.format, LogFormat::Compact);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{nope").unwrap();
        assert!(matches!(load_file_layer(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn invalid_merged_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"dispatch_queue_capacity": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut s = TallySettings::default();
        apply_overrides_from(
            &mut s,
            env(&[
                ("TALLY_HOST", "127.0.0.1"),
                ("TALLY_PORT", "0"),
                ("TALLY_CATALOG_PATH", "/etc/tally/games.json"),
                ("TALLY_DISPATCH_QUEUE", "16"),
                ("TALLY_SEND_QUEUE", "8"),
                ("TALLY_MAX_FRAME_ERRORS", "3"),
                ("TALLY_LOG_LEVEL", "debug"),
                ("TALLY_LOG_FORMAT", "pretty"),
                ("TALLY_LOG_ANSI", "yes"),
            ]),
        );
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 0);
        assert_eq!(s.catalog.path, PathBuf::from("/etc/tally/games.json"));
        assert_eq!(s.server.dispatch_queue_capacity, 16);
        assert_eq!(s.server.max_send_queue, 8);
        assert_eq!(s.server.max_consecutive_frame_errors, 3);
        assert_eq!(s.logging.level, "debug");
        assert_eq!(s.logging.format, LogFormat::Pretty);
        assert!(s.logging.ansi);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut s = TallySettings::default();
        apply_overrides_from(
            &mut s,
            env(&[
                ("TALLY_PORT", "70000"),
                ("TALLY_DISPATCH_QUEUE", "0"),
                ("TALLY_LOG_FORMAT", "xml"),
                ("TALLY_LOG_ANSI", "maybe"),
                ("TALLY_HOST", ""),
            ]),
        );
        assert_eq!(s, TallySettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_range_bounds() {
        assert_eq!(parse_range::<u16>("8080", 1, 65535), Some(8080));
        assert_eq!(parse_range::<usize>("0", 1, 10), None);
        assert_eq!(parse_range::<u32>("11", 1, 10), None);
        assert_eq!(parse_range::<u64>("abc", 1, 10), None);
    }
}
