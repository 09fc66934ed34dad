//! Runtime configuration.

use serde::Deserialize;

use crate::critic::CriticOptions;
use crate::planning::{CapabilityFailurePolicy, PlanningOptions};
use crate::scorer::DEFAULT_LOW_THRESHOLD;

pub use crate::osrm::OsrmConfig;

/// Orchestrator settings; every field may be omitted from a JSON config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_steps: usize,
    pub max_revisions: usize,
    pub low_threshold: i64,
    /// Arguments for the station prefetch.
    pub nearby_k: i64,
    pub nearby_radius_km: f64,
    pub prefetch_stations: bool,
    pub suggest_order: bool,
    pub capability_failures: CapabilityFailurePolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_revisions: 4,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            nearby_k: 10,
            nearby_radius_km: 3.0,
            prefetch_stations: true,
            suggest_order: true,
            capability_failures: CapabilityFailurePolicy::Propagate,
        }
    }
}

impl PlannerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn planning_options(&self) -> PlanningOptions {
        PlanningOptions {
            max_steps: self.max_steps,
            capability_failures: self.capability_failures,
        }
    }

    pub fn critic_options(&self) -> CriticOptions {
        CriticOptions {
            max_revisions: self.max_revisions,
            low_threshold: self.low_threshold,
        }
    }
}

/// Settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    /// Base URL; `/chat/completions` is appended.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }
}

impl OracleConfig {
    /// Defaults overridden by `ORACLE_ENDPOINT`, `ORACLE_MODEL` and
    /// `ORACLE_API_KEY` (or `OPENAI_API_KEY`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup("ORACLE_ENDPOINT") {
            config.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("ORACLE_MODEL") {
            config.model = model;
        }
        config.api_key = lookup("ORACLE_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|key| !key.trim().is_empty());
        config
    }
}
