//! Configuration types.

use std::time::Duration;

/// Pipeline and service configuration.
///
/// Every knob has a default matching production behavior; `from_env` lets
/// deployments override individual values without a config file.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent pipeline workers. Fixed, not elastic — this is
    /// the rate-limit control for the enrichment service.
    pub worker_count: usize,
    /// Maximum message identifiers fetched per listing call.
    pub list_max: usize,
    /// Mailbox search query used when the client does not supply one.
    pub default_query: String,
    /// Heartbeat interval for long-lived streams.
    pub heartbeat: Duration,
    /// TTL for cached enrichment results.
    pub cache_ttl: Duration,
    /// Interval between background cache sweeps.
    pub sweep_interval: Duration,
    /// Maximum characters of message body sent to the enrichment service.
    pub max_prompt_body_chars: usize,
    /// Maximum characters of cleaned body text kept from a fetched message.
    pub max_body_chars: usize,
    /// Maximum length of a derived cache key.
    pub cache_key_max_chars: usize,
    /// Enrichment model identifier.
    pub model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: 5, // more risks enrichment-service rate limits
            list_max: 10,
            default_query: String::new(),
            heartbeat: Duration::from_secs(15),
            cache_ttl: Duration::from_secs(3600), // 1 hour
            sweep_interval: Duration::from_secs(600),
            max_prompt_body_chars: 4000,
            max_body_chars: 2000,
            cache_key_max_chars: 100,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Build config from environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let worker_count = env_parse("MAILSENSE_WORKERS", defaults.worker_count);
        let list_max = env_parse("MAILSENSE_LIST_MAX", defaults.list_max);
        let default_query =
            std::env::var("MAILSENSE_QUERY").unwrap_or_else(|_| defaults.default_query.clone());
        let heartbeat = Duration::from_secs(env_parse(
            "MAILSENSE_HEARTBEAT_SECS",
            defaults.heartbeat.as_secs(),
        ));
        let cache_ttl = Duration::from_secs(env_parse(
            "MAILSENSE_CACHE_TTL_SECS",
            defaults.cache_ttl.as_secs(),
        ));
        let sweep_interval = Duration::from_secs(env_parse(
            "MAILSENSE_SWEEP_SECS",
            defaults.sweep_interval.as_secs(),
        ));
        let model = std::env::var("MAILSENSE_MODEL").unwrap_or_else(|_| defaults.model.clone());

        Self {
            worker_count,
            list_max,
            default_query,
            heartbeat,
            cache_ttl,
            sweep_interval,
            model,
            ..defaults
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_knobs() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.worker_count, 5);
        assert_eq!(cfg.list_max, 10);
        assert_eq!(cfg.heartbeat, Duration::from_secs(15));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.max_prompt_body_chars, 4000);
        assert_eq!(cfg.max_body_chars, 2000);
        assert_eq!(cfg.cache_key_max_chars, 100);
    }
}
