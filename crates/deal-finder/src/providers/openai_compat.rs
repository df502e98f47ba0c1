use async_trait::async_trait;

use deal_common::model::ProviderKind;
use deal_common::openai::{ChatClient, ChatClientConfig, ChatCompletionRequest, Message};

use super::{DealProvider, ProviderError};
use crate::config::{Endpoint, ProviderConfig};

const SYSTEM_PROMPT: &str =
    "You are a shopping assistant that finds Black Friday deals and answers with JSON only.";

/// Adapter for vendors exposing an OpenAI-style `/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    kind: ProviderKind,
    model: String,
    client: ChatClient,
}

impl OpenAiCompatProvider {
    pub fn openai(api_key: &str, config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(ProviderKind::OpenAi, &config.openai, api_key, config)
    }

    /// Perplexity's sonar models search the web on their own; no extra
    /// request options are needed.
    pub fn perplexity(api_key: &str, config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(ProviderKind::Perplexity, &config.perplexity, api_key, config)
    }

    fn new(
        kind: ProviderKind,
        endpoint: &Endpoint,
        api_key: &str,
        config: &ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let client_config = ChatClientConfig::new(&endpoint.base_url, api_key, config.timeout)
            .with_max_retries(config.max_retries);
        Ok(Self {
            kind,
            model: endpoint.model.clone(),
            client: ChatClient::new(client_config)?,
        })
    }
}

#[async_trait]
impl DealProvider for OpenAiCompatProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
            temperature: Some(0.7),
            max_tokens: Some(4096),
        };
        let response = self.client.chat_completions(request, None).await?;
        response
            .first_text()
            .map(str::to_string)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyReply)
    }
}
