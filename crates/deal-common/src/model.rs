use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category selector value meaning "no category restriction".
pub const ALL_CATEGORIES: &str = "all";

pub const CATEGORIES: [&str; 6] = [
    "Electronics",
    "Home & Kitchen",
    "Fashion",
    "Toys & Games",
    "Sports",
    "Books",
];

/// One normalized product discount record.
///
/// Prices, savings and rating are kept as strings so that the formatting a
/// provider chose survives the round trip. `savings` is not checked against
/// `originalPrice - salePrice` for provider-sourced deals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub original_price: String,
    pub sale_price: String,
    pub savings: String,
    pub discount_percent: u32,
    pub rating: String,
    pub reviews: u64,
    pub stock: u64,
    pub seller: String,
    pub shipping_cost: String,
    pub product_url: String,
    pub image_url: String,
}

/// A selectable source of deal data.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Perplexity,
    #[default]
    Mock,
}

impl ProviderKind {
    pub const LIVE: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Perplexity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Perplexity => "perplexity",
            ProviderKind::Mock => "mock",
        }
    }

    /// Whether this provider talks to a remote API and therefore needs a key.
    pub fn is_live(&self) -> bool {
        !matches!(self, ProviderKind::Mock)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            "perplexity" => Ok(ProviderKind::Perplexity),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Persisted provider selection and per-provider API keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "aiProvider", default)]
    pub active_provider: ProviderKind,
    #[serde(default)]
    pub api_keys: BTreeMap<ProviderKind, String>,
}

impl Settings {
    /// Returns the stored key for `provider`, ignoring blank entries.
    pub fn api_key(&self, provider: ProviderKind) -> Option<&str> {
        self.api_keys
            .get(&provider)
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
    }

    pub fn has_key(&self, provider: ProviderKind) -> bool {
        self.api_key(provider).is_some()
    }

    /// Merge an update: the provider is replaced when given, and a key is
    /// replaced only when the submitted value is non-empty.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(provider) = update.ai_provider {
            self.active_provider = provider;
        }
        for (provider, key) in update.api_keys {
            let key = key.trim();
            if !key.is_empty() {
                self.api_keys.insert(provider, key.to_string());
            }
        }
    }
}

/// A save request as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub ai_provider: Option<ProviderKind>,
    #[serde(default)]
    pub api_keys: BTreeMap<ProviderKind, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_wire_names() {
        for kind in ProviderKind::LIVE.iter().chain([ProviderKind::Mock].iter()) {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), *kind);
        }
        assert!("bing".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn empty_key_preserves_previous_value() {
        let mut settings = Settings::default();
        settings
            .api_keys
            .insert(ProviderKind::OpenAi, "sk-old".to_string());

        let mut update = SettingsUpdate::default();
        update.api_keys.insert(ProviderKind::OpenAi, "  ".to_string());
        settings.apply(update);
        assert_eq!(settings.api_key(ProviderKind::OpenAi), Some("sk-old"));

        let mut update = SettingsUpdate::default();
        update.api_keys.insert(ProviderKind::OpenAi, "sk-new".to_string());
        settings.apply(update);
        assert_eq!(settings.api_key(ProviderKind::OpenAi), Some("sk-new"));
    }

    #[test]
    fn settings_use_persisted_key_names() {
        let mut settings = Settings {
            active_provider: ProviderKind::Gemini,
            ..Default::default()
        };
        settings
            .api_keys
            .insert(ProviderKind::Gemini, "g-key".to_string());
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["aiProvider"], "gemini");
        assert_eq!(value["apiKeys"]["gemini"], "g-key");
    }

    #[test]
    fn deal_serializes_camel_case() {
        let deal = Deal {
            id: "d1".into(),
            title: "t".into(),
            description: "d".into(),
            category: "Books".into(),
            original_price: "10.00".into(),
            sale_price: "5.00".into(),
            savings: "5.00".into(),
            discount_percent: 50,
            rating: "4.5".into(),
            reviews: 1,
            stock: 2,
            seller: "Amazon".into(),
            shipping_cost: "FREE".into(),
            product_url: "#".into(),
            image_url: "x".into(),
        };
        let value = serde_json::to_value(&deal).unwrap();
        assert_eq!(value["salePrice"], "5.00");
        assert_eq!(value["discountPercent"], 50);
        assert_eq!(value["shippingCost"], "FREE");
    }
}
