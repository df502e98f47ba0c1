use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deal_common::model::ProviderKind;
use deal_common::openai::parse_json_response;

use super::{DealProvider, ProviderError};
use crate::config::ProviderConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;
const WEB_SEARCH_MAX_USES: u32 = 5;

/// Adapter for the Anthropic Messages API, with server-side web search
/// enabled so the model can look up current prices.
pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent("deal-finder")
            .build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: config.anthropic.base_url.clone(),
            model: config.anthropic.model.clone(),
            timeout: config.timeout,
            http,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<UserMessage<'a>>,
    tools: Vec<WebSearchTool>,
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WebSearchTool {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    max_uses: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Join every text block. Tool-use and search-result blocks are skipped.
fn reply_text(response: &MessagesResponse) -> String {
    response
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl DealProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: 4096,
            messages: vec![UserMessage {
                role: "user",
                content: prompt,
            }],
            tools: vec![WebSearchTool {
                kind: "web_search_20250305",
                name: "web_search",
                max_uses: WEB_SEARCH_MAX_USES,
            }],
        };
        let resp = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;
        let response: MessagesResponse = parse_json_response(resp, MAX_ERROR_BODY_BYTES).await?;

        let text = reply_text(&response);
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyReply);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_joins_text_blocks_only() {
        let raw = r#"{"content":[
            {"type":"server_tool_use","id":"t1","name":"web_search","input":{"query":"tv deals"}},
            {"type":"web_search_tool_result","tool_use_id":"t1","content":[]},
            {"type":"text","text":"[{\"title\":"},
            {"type":"text","text":"\"TV\"}]"}
        ]}"#;
        let response: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(reply_text(&response), r#"[{"title":"TV"}]"#);
    }

    #[test]
    fn request_enables_web_search() {
        let request = MessagesRequest {
            model: "m",
            max_tokens: 10,
            messages: vec![UserMessage {
                role: "user",
                content: "hi",
            }],
            tools: vec![WebSearchTool {
                kind: "web_search_20250305",
                name: "web_search",
                max_uses: 1,
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tools"][0]["type"], "web_search_20250305");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
