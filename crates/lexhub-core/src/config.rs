//! Hub configuration.

use crate::primitives::{ANALYTICS_TTL_MULTIPLIER, DEFAULT_PAGE_SIZE, DEFAULT_TTL_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings the hub consumes. Loading them is the app's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Prefix of every cache key the hub owns.
    pub namespace: String,
    pub default_ttl_secs: u64,
    pub default_page_size: usize,
    /// Publish `data.realtime.sync` after each mutation.
    pub real_time_sync: bool,
    /// Let the context layer prefetch predicted next views.
    pub predictive_loading: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            namespace: "hub".to_string(),
            default_ttl_secs: DEFAULT_TTL_SECS,
            default_page_size: DEFAULT_PAGE_SIZE,
            real_time_sync: false,
            predictive_loading: true,
        }
    }
}

impl HubConfig {
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Analytics results live longer than plain reads.
    #[must_use]
    pub fn analytics_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs.saturating_mul(ANALYTICS_TTL_MULTIPLIER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_ttl_doubles_default() {
        let config = HubConfig::default();
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.analytics_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: HubConfig =
            serde_json::from_str(r#"{"namespace":"lex"}"#).expect("parse");
        assert_eq!(config.namespace, "lex");
        assert_eq!(config.default_page_size, 25);
        assert!(config.predictive_loading);
    }
}
