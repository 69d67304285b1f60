use super::{
    ChatRequest, ContentPart, FinalAnswer, LLMError, LLMProvider, LLMResponse, Message,
    MessageRole, ToolCall, ToolDeclaration,
};
use crate::config::GeminiConfig;
use crate::secrets::{SecretManager, SecretString};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

pub struct GeminiProvider {
    config: GeminiConfig,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, api_key: SecretString) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn part_json(part: &ContentPart) -> Value {
        match part {
            ContentPart::Text { text } => json!({ "text": text }),
            ContentPart::InlineData { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
        }
    }

    fn message_json(msg: &Message) -> Value {
        match msg.role {
            MessageRole::User => json!({
                "role": "user",
                "parts": [{ "text": msg.content }]
            }),
            MessageRole::Assistant => match &msg.tool_call {
                Some(call) => {
                    let args: Value = serde_json::from_str(&call.arguments).unwrap_or(json!({}));
                    json!({
                        "role": "model",
                        "parts": [{
                            "functionCall": { "id": call.id, "name": call.name, "args": args }
                        }]
                    })
                }
                None => json!({
                    "role": "model",
                    "parts": [{ "text": msg.content }]
                }),
            },
            MessageRole::Tool => json!({
                "role": "user",
                "parts": [{
                    "functionResponse": {
                        "id": msg.tool_call_id,
                        "name": msg.tool_name,
                        "response": { "result": msg.content }
                    }
                }]
            }),
        }
    }

    fn tools_json(tools: &[ToolDeclaration]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        json!([{ "functionDeclarations": declarations }])
    }

    fn key_header(&self) -> super::Result<reqwest::header::HeaderValue> {
        self.api_key.header_value().map_err(|_| {
            LLMError::AuthenticationFailed("API key contains invalid characters".to_string())
        })
    }

    fn transport_error(e: reqwest::Error) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout
        } else {
            LLMError::NetworkError(e.to_string())
        }
    }

    /// Map a non-success response to an error, with any keys scrubbed from the body.
    async fn status_error(response: reqwest::Response) -> LLMError {
        let status = response.status();
        let text = SecretManager::scrub(&response.text().await.unwrap_or_default());

        match status.as_u16() {
            429 => LLMError::RateLimitExceeded,
            401 | 403 => LLMError::AuthenticationFailed(text),
            400..=499 => LLMError::InvalidRequest(text),
            _ => LLMError::ProviderUnavailable(format!("Gemini API error ({}): {}", status, text)),
        }
    }

    /// POST a generateContent payload and return the parts of the first candidate.
    async fn send(&self, payload: &Value) -> super::Result<Vec<Value>> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", self.key_header()?)
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let candidate = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No candidates in response".to_string()))?;

        // A candidate stopped by safety filters carries no content at all
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(parts)
    }

    fn collect_text(parts: &[Value]) -> String {
        let mut full_text = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                full_text.push_str(text);
            }
        }
        full_text
    }

    fn collect_tool_calls(parts: &[Value]) -> Vec<ToolCall> {
        parts
            .iter()
            .filter_map(|part| part.get("functionCall"))
            .filter_map(|call| {
                let name = call.get("name")?.as_str()?;
                let args = call.get("args").cloned().unwrap_or(json!({}));
                Some(match call.get("id").and_then(|id| id.as_str()) {
                    Some(id) => ToolCall::new(id, name, args.to_string()),
                    None => ToolCall::with_generated_id(name, args.to_string()),
                })
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    /// Fetch the configured model's metadata, which needs a valid key and
    /// an existing model but spends no tokens.
    async fn check_health(&self) -> super::Result<()> {
        let url = format!("{}/models/{}", self.config.base_url, self.config.model);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", self.key_header()?)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(response).await)
        }
    }

    async fn generate(&self, parts: &[ContentPart]) -> super::Result<String> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": parts.iter().map(Self::part_json).collect::<Vec<_>>(),
            }]
        });

        debug!("Gemini generate with {} parts", parts.len());
        let parts = self.send(&payload).await?;
        Ok(Self::collect_text(&parts))
    }

    async fn chat(&self, request: &ChatRequest) -> super::Result<LLMResponse> {
        let mut payload = serde_json::Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(request.messages.iter().map(Self::message_json).collect()),
        );

        if !request.system.is_empty() {
            payload.insert(
                "systemInstruction".to_string(),
                json!({ "parts": request.system.iter().map(Self::part_json).collect::<Vec<_>>() }),
            );
        }

        if !request.tools.is_empty() {
            payload.insert("tools".to_string(), Self::tools_json(&request.tools));
        }

        debug!(
            "Gemini chat with {} messages and {} tools",
            request.messages.len(),
            request.tools.len()
        );
        let parts = self.send(&Value::Object(payload)).await?;

        let calls = Self::collect_tool_calls(&parts);
        if !calls.is_empty() {
            return Ok(LLMResponse::ToolCalls { calls });
        }

        Ok(LLMResponse::FinalAnswer(FinalAnswer::new(
            Self::collect_text(&parts),
        )))
    }
}
