//! Gemini generateContent 后端
//!
//! 使用 responseSchema 约束输出为 JSON，并开启 thinking 以获得更深入的分析。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::OracleBackend;
use crate::config::OracleConfig;
use crate::error::{Result, ScanError};
use crate::http::{build_http_client, send_with_retry, RetryPolicy};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

pub struct GeminiBackend {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
    thinking_budget: u32,
    retry: RetryPolicy,
}

impl GeminiBackend {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            thinking_budget: config.thinking_budget,
            retry: config.retry.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn build_request_body(&self, prompt: &str, schema: &Value) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
                "thinkingConfig": { "thinkingBudget": self.thinking_budget }
            }
        })
    }
}

/// 拼接第一个候选结果中的非 thinking 文本
fn extract_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl OracleBackend for GeminiBackend {
    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn generate(&self, prompt: &str, schema: &Value) -> Result<Option<String>> {
        let api_key = self.api_key.as_deref().ok_or(ScanError::MissingApiKey)?;
        let url = self.endpoint();
        let body = self.build_request_body(prompt, schema);

        let response = send_with_retry(&self.retry, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&body)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini analysis error: HTTP {}: {}", status, body);
            return Err(ScanError::OracleUnavailable {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ScanError::OracleResponseInvalid(format!("unreadable generateContent response: {}", e))
        })?;
        Ok(extract_text(parsed))
    }
}
