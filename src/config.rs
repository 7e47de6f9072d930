// Copyright 2025 Cowboy AI, LLC.

//! Runtime configuration
//!
//! Tuning knobs for the composer and the slot graph. A context carries one
//! `RuntimeConfig`; instances read it from the context they were created in.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::AxiomResult;

/// Configuration for the object runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Feedback depth after which `relate_to`/`relate_from` report divergence
    pub divergence_threshold: usize,
    /// Delay applied to merged listeners that do not set their own
    pub default_merge_delay_ms: u64,
    /// Reject unknown constructor arguments instead of warning
    pub strict_constructor_args: bool,
    /// Property-name suffix reserved for slot accessors
    pub reserved_name_suffix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            divergence_threshold: 5,
            default_merge_delay_ms: 16,
            strict_constructor_args: false,
            reserved_name_suffix: "$".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> AxiomResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON schema describing the configuration document
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(RuntimeConfig)).unwrap_or_default()
    }
}
