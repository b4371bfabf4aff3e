//! Common helpers for creating test configs and payloads.

use rtcperf_core::{config::AppConfig, ingest::ExternalStats};

/// Default config without any sink enabled.
#[must_use]
pub fn quiet_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.stats.show_stats = false;
    config
}

/// Default config with the given alert rules and no sinks.
#[must_use]
pub fn config_with_rules(rules: &str) -> AppConfig {
    let mut config = quiet_config();
    config.alerts.rules = rules.to_string();
    config
}

/// Builds an external payload from `(metric, label, values)` triples.
#[must_use]
pub fn external_stats(entries: &[(&str, &str, &[f64])]) -> ExternalStats {
    let mut stats = ExternalStats::new();
    for (metric, label, values) in entries {
        stats
            .entry((*metric).to_string())
            .or_default()
            .entry((*label).to_string())
            .or_default()
            .extend_from_slice(values);
    }
    stats
}
