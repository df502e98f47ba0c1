use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Deal, ProviderKind};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SearchDealsParams {
    /// Free-text product query. Empty returns any deals.
    pub query: Option<String>,
    /// Category name such as "Electronics", or "all" (default).
    pub category: Option<String>,
    /// One of "discount" (default), "price-low", "price-high", "rating", "savings".
    pub sort: Option<String>,
}

/// Where a result set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DealSource {
    Live,
    Mock,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchDealsResponse {
    pub source: DealSource,
    pub provider: ProviderKind,
    pub summary: String,
    /// Ids of deals with fewer than 30 units left.
    pub low_stock: Vec<String>,
    pub deals: Vec<Deal>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub ai_provider: ProviderKind,
    /// Which providers currently have a stored key. Keys themselves are never returned.
    pub configured: BTreeMap<ProviderKind, bool>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SaveSettingsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckApiKeyParams {
    /// Provider name: "openai", "anthropic", "gemini", "perplexity" or "mock".
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckApiKeyResponse {
    pub has_key: bool,
}
