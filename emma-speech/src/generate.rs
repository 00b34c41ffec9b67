//! Free-form response generation over an OpenAI-compatible chat API.

use async_trait::async_trait;
use emma_core::{EmmaError, Result, TextGenerator};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

/// Generator configuration, loadable from environment variables.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("EMMA_LLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: std::env::var("EMMA_LLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            api_key: std::env::var("EMMA_LLM_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("EMMA_LLM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("EMMA_LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
            max_tokens: 256,
            system_prompt: std::env::var("EMMA_SYSTEM_PROMPT").unwrap_or_else(|_| {
                "You are Emma, a small and friendly robot assistant. Answer briefly and clearly."
                    .into()
            }),
        }
    }
}

/// Chat-completions client implementing the core's generation contract.
pub struct HostedGenerator {
    http: reqwest::Client,
    cfg: GeneratorConfig,
}

impl HostedGenerator {
    pub fn new(cfg: GeneratorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| EmmaError::Generation(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeneratorConfig::default())
    }
}

#[async_trait]
impl TextGenerator for HostedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        debug!(target = "generate", %url, model = %self.cfg.model, "requesting completion");

        let body = json!({
            "model": self.cfg.model,
            "messages": [
                { "role": "system", "content": self.cfg.system_prompt },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": self.cfg.max_tokens,
            "temperature": self.cfg.temperature,
        });

        let mut req = self.http.post(&url).header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| EmmaError::Generation(format!("chat completions HTTP error: {}", e)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target = "generate", %status, body = %text, "chat completions error");
            return Err(EmmaError::Generation(format!(
                "chat completions error: status={} body={}",
                status, text
            )));
        }

        let val: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EmmaError::Generation(format!("parse completions JSON: {}", e)))?;
        extract_text(&val).ok_or_else(|| {
            EmmaError::Generation("missing choices[0].message.content in response".into())
        })
    }
}

fn extract_text(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_first_choice_content() {
        let val = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  Hi there!  " } }
            ]
        });
        assert_eq!(extract_text(&val).as_deref(), Some("Hi there!"));
    }

    #[test]
    fn missing_content_yields_none() {
        assert_eq!(extract_text(&json!({"choices": []})), None);
        assert_eq!(extract_text(&json!({})), None);
    }
}
