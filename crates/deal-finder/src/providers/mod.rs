/// Live deal sources backed by LLM vendor APIs.
///
/// Every vendor is reduced to the same capability: send one prompt, get the
/// model's text back. Which adapter runs is a lookup in `ProviderRegistry`
/// keyed by `ProviderKind`.
mod anthropic;
mod gemini;
mod openai_compat;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};

use deal_common::model::{ProviderKind, Settings, ALL_CATEGORIES};
use deal_common::openai::ChatClientError;

use crate::config::ProviderConfig;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no API key configured for {0}")]
    MissingCredential(ProviderKind),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("provider reply contained no text")]
    EmptyReply,

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<ChatClientError> for ProviderError {
    fn from(err: ChatClientError) -> Self {
        match err {
            ChatClientError::Request(e) => ProviderError::Request(e),
            ChatClientError::InvalidJson(e) => ProviderError::Upstream {
                status: StatusCode::OK,
                message: format!("invalid response JSON: {e}"),
            },
            ChatClientError::Upstream { status, message } => {
                ProviderError::Upstream { status, message }
            }
            ChatClientError::UpstreamBody { status, body } => ProviderError::Upstream {
                status,
                message: body,
            },
        }
    }
}

#[async_trait]
pub trait DealProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// Send `prompt` and return the raw model text.
    async fn call(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Adapters for every provider that has a usable key.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn DealProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one adapter per live provider with a non-empty key. A provider
    /// whose HTTP client cannot be built is left out and logged.
    pub fn from_settings(settings: &Settings, config: &ProviderConfig) -> Self {
        let mut registry = Self::new();
        for kind in ProviderKind::LIVE {
            let Some(key) = settings.api_key(kind) else {
                continue;
            };
            let built = match kind {
                ProviderKind::OpenAi => OpenAiCompatProvider::openai(key, config).map(shared),
                ProviderKind::Perplexity => {
                    OpenAiCompatProvider::perplexity(key, config).map(shared)
                }
                ProviderKind::Anthropic => AnthropicProvider::new(key, config).map(shared),
                ProviderKind::Gemini => GeminiProvider::new(key, config).map(shared),
                ProviderKind::Mock => continue,
            };
            match built {
                Ok(adapter) => {
                    info!(provider = %kind, model = adapter.model(), "provider client ready");
                    registry.insert(adapter);
                }
                Err(e) => warn!(provider = %kind, error = %e, "failed to build provider client"),
            }
        }
        registry
    }

    pub fn insert(&mut self, adapter: Arc<dyn DealProvider>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn DealProvider>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.adapters.contains_key(&kind)
    }
}

fn shared<P: DealProvider + 'static>(provider: P) -> Arc<dyn DealProvider> {
    Arc::new(provider)
}

/// Build the deal-search prompt shared by every vendor.
pub fn build_prompt(query: &str, category: &str) -> String {
    let query = query.trim();
    let subject = if query.is_empty() {
        "popular products".to_string()
    } else {
        format!("\"{query}\"")
    };
    let category_rule = if category.is_empty() || category.eq_ignore_ascii_case(ALL_CATEGORIES) {
        "Include deals from any product category.".to_string()
    } else {
        format!(
            "Only include deals in the \"{category}\" category and set \"category\" to \"{category}\" on every deal."
        )
    };

    format!(
        "Find 10 to 20 current Black Friday deals for {subject}. {category_rule}\n\n\
Return ONLY a JSON array, with no explanation and no markdown. Each element must be an object with these fields:\n\
- \"id\": unique string\n\
- \"title\": product name including brand\n\
- \"description\": one sentence describing the deal\n\
- \"category\": product category\n\
- \"originalPrice\": regular price as a string with two decimals, no currency symbol\n\
- \"salePrice\": discounted price as a string with two decimals, no currency symbol\n\
- \"savings\": originalPrice minus salePrice as a string with two decimals\n\
- \"discountPercent\": integer percentage off\n\
- \"rating\": average rating between 3.0 and 5.0 as a string\n\
- \"reviews\": integer number of reviews\n\
- \"stock\": integer units available\n\
- \"seller\": retailer name\n\
- \"shippingCost\": \"FREE\" or a price such as \"$5.99\"\n\
- \"productUrl\": link to the product page\n\
- \"imageUrl\": link to a product image\n\n\
Make sure savings equals originalPrice minus salePrice."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(ProviderKind);

    #[async_trait]
    impl DealProvider for Echo {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        fn model(&self) -> &str {
            "echo"
        }

        async fn call(&self, prompt: &str) -> Result<String, ProviderError> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn prompt_interpolates_category_and_query() {
        let prompt = build_prompt("laptop", "Electronics");
        assert!(prompt.contains("\"laptop\""));
        assert!(prompt.contains("Only include deals in the \"Electronics\" category"));
        assert!(prompt.contains("Return ONLY a JSON array"));

        let prompt = build_prompt("  ", "all");
        assert!(prompt.contains("popular products"));
        assert!(prompt.contains("any product category"));
    }

    #[test]
    fn registry_only_holds_providers_with_keys() {
        let mut settings = Settings::default();
        settings
            .api_keys
            .insert(ProviderKind::OpenAi, "sk-test".to_string());
        settings
            .api_keys
            .insert(ProviderKind::Gemini, String::new());

        let registry = ProviderRegistry::from_settings(&settings, &ProviderConfig::default());
        assert!(registry.contains(ProviderKind::OpenAi));
        assert!(!registry.contains(ProviderKind::Gemini));
        assert!(!registry.contains(ProviderKind::Anthropic));
        assert!(!registry.contains(ProviderKind::Mock));
    }

    #[tokio::test]
    async fn lookup_is_keyed_by_kind() {
        let mut registry = ProviderRegistry::new();
        registry.insert(Arc::new(Echo(ProviderKind::Perplexity)));
        let adapter = registry.get(ProviderKind::Perplexity).unwrap();
        assert_eq!(adapter.call("ping").await.unwrap(), "ping");
        assert!(registry.get(ProviderKind::OpenAi).is_none());
    }

    #[test]
    fn upstream_errors_keep_status_and_message() {
        let err = ProviderError::from(ChatClientError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            message: "Incorrect API key provided".to_string(),
        });
        assert!(matches!(
            &err,
            ProviderError::Upstream { status, message }
                if *status == StatusCode::UNAUTHORIZED && message == "Incorrect API key provided"
        ));
        assert!(err.to_string().contains("Incorrect API key provided"));

        let err = ProviderError::from(ChatClientError::UpstreamBody {
            status: StatusCode::BAD_GATEWAY,
            body: "<html>bad gateway</html>".to_string(),
        });
        assert!(matches!(
            err,
            ProviderError::Upstream { status, ref message }
                if status == StatusCode::BAD_GATEWAY && message.contains("bad gateway")
        ));
    }
}
