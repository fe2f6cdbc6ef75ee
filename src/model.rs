use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_PROVIDER_MODEL: &str = "openai";

/// Query parameters that take part in generation and in the cache fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub model: String,
    #[serde(default)]
    pub seed: Option<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_PROVIDER_MODEL.to_string(),
            seed: None,
        }
    }
}

impl QueryParams {
    pub fn new(model: impl Into<String>, seed: Option<String>) -> Self {
        Self {
            model: model.into(),
            seed,
        }
    }

    /// JSON object with keys in sorted order, independent of field declaration order.
    pub fn canonical_json(&self) -> String {
        let mut map = BTreeMap::new();
        map.insert("model", serde_json::Value::String(self.model.clone()));
        map.insert(
            "seed",
            self.seed
                .clone()
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        );
        // A map of strings and nulls always serializes.
        serde_json::to_string(&map).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Primary,
    Fallback,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Primary => f.write_str("primary"),
            ProviderKind::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub content: String,
    pub provider: ProviderKind,
}
