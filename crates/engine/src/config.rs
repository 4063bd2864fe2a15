//! Engine configuration
//!
//! TTLs are configurable via file/env, not hardcoded at use sites.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the rule evaluation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// TTL of the cached active-rules set per organization, in seconds
    #[serde(default = "default_rules_cache_ttl_secs")]
    pub rules_cache_ttl_secs: u64,

    /// Severity of the internal diagnostic alert raised when an active rule
    /// turns out to be malformed at evaluation time
    #[serde(default = "default_diagnostic_category")]
    pub diagnostic_category: String,
}

fn default_rules_cache_ttl_secs() -> u64 {
    60
}

fn default_diagnostic_category() -> String {
    "internal".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_cache_ttl_secs: default_rules_cache_ttl_secs(),
            diagnostic_category: default_diagnostic_category(),
        }
    }
}

impl EngineConfig {
    /// Rules cache TTL as a duration
    pub fn rules_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rules_cache_ttl_secs)
    }
}
