use crate::{Classifier, ProviderError};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
}

/// Remote classifier speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct RemoteClassifier {
    client: Client,
    endpoint: Url,
    cfg: Arc<OpenAiConfig>,
}

impl RemoteClassifier {
    pub fn new(cfg: OpenAiConfig) -> Result<Self, ProviderError> {
        let base = validate_endpoint(&cfg.base_url)?;
        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            base.as_str().trim_end_matches('/')
        ))
        .map_err(|e| ProviderError::InsecureEndpoint(e.to_string()))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            cfg: Arc::new(cfg),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Accepts only `https` URLs with a host.
pub fn validate_endpoint(base_url: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(base_url.trim())
        .map_err(|e| ProviderError::InsecureEndpoint(format!("{base_url}: {e}")))?;
    if url.scheme() != "https" || url.host_str().map_or(true, str::is_empty) {
        return Err(ProviderError::InsecureEndpoint(base_url.to_string()));
    }
    Ok(url)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ',' && *c != '\n' && *c != '\r')
        .collect()
}

fn build_prompt(file_names: &[String], labels: &[String]) -> String {
    let files: Vec<String> = file_names.iter().map(|f| sanitize(f)).collect();
    format!(
        "Categorize these files: {} into {}. Reply with exactly one category per file, \
         in the same order, separated by \", \" and nothing else.",
        files.join(", "),
        labels.join(", ")
    )
}

/// Splits the model reply into one label per file. A reply with the wrong
/// number of labels is rejected as `InvalidResponse`.
pub fn parse_reply(reply: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
    let labels: Vec<String> = reply
        .trim()
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if labels.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {expected} labels, got {}",
            labels.len()
        )));
    }
    Ok(labels)
}

#[async_trait::async_trait]
impl Classifier for RemoteClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(
        &self,
        file_names: &[String],
        labels: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        #[derive(serde::Serialize)]
        struct ChatMessage<'a> {
            role: &'static str,
            content: &'a str,
        }
        #[derive(serde::Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChatMessageResp,
        }
        #[derive(Deserialize)]
        struct ChatMessageResp {
            content: String,
        }
        #[derive(Deserialize)]
        struct ChatApiResponse {
            choices: Vec<Choice>,
        }

        if file_names.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_prompt(file_names, labels);
        debug!(endpoint = %self.endpoint, files = file_names.len(), "requesting remote classification");
        let body = ChatRequest {
            model: &self.cfg.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            max_tokens: 100,
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Authentication(format!("status {status}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {:?}",
                status, body
            )));
        }

        let parsed: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse("no choices".into()))?;

        parse_reply(content, file_names.len())
    }
}
