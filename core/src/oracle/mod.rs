// Oracle module - 远程结构化分析服务
// 发送语料和输出 schema，解析并校验返回的报告

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Result, ScanError};
use crate::model::{AnalysisRequest, RiskLevel, Severity};

pub use gemini::GeminiBackend;

/// 结构化生成服务 trait
#[async_trait]
pub trait OracleBackend: Send + Sync {
    fn name(&self) -> String;

    /// 发送一次生成请求，返回响应正文；服务没有返回文本时为 None
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<Option<String>>;
}

/// 服务返回的原始报告，字段与 schema 一一对应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleReport {
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub language: String,
    pub vulnerabilities: Vec<OracleVulnerability>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleVulnerability {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub line: i64,
    pub description: String,
    pub code_snippet: Option<String>,
    pub recommendation: String,
    pub fixed_code: String,
    pub cwe: Option<String>,
}

/// 解析后的报告加上耗时
#[derive(Debug, Clone)]
pub struct OracleOutput {
    pub report: OracleReport,
    pub scan_duration_ms: u64,
}

/// 空响应或非 JSON 为 Invalid；JSON 不符合 schema 为 Malformed
pub fn parse_report(body: &str) -> Result<OracleReport> {
    if body.trim().is_empty() {
        return Err(ScanError::OracleResponseInvalid("empty response body".to_string()));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ScanError::OracleResponseInvalid(format!("response is not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(ScanError::OracleResponseInvalid(
            "response is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(ScanError::OracleResponseMalformed)
}

/// 分析客户端：空输入检查、构造提示词、调用一次服务、校验结果
#[derive(Clone)]
pub struct AnalysisClient {
    backend: Arc<dyn OracleBackend>,
    schema: Value,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn OracleBackend>) -> Self {
        Self {
            backend,
            schema: prompt::analysis_schema(),
        }
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<OracleOutput> {
        if request.corpus().trim().is_empty() {
            return Err(ScanError::EmptyInput);
        }

        let started = Instant::now();
        let prompt = prompt::build_prompt(request.corpus(), request.language_hint());
        tracing::info!(
            "Sending {} chars to {} (hint: {})",
            request.corpus().chars().count(),
            self.backend_name(),
            request.language_hint().unwrap_or("auto")
        );

        let body = self.backend.generate(&prompt, &self.schema).await?;
        let scan_duration_ms = started.elapsed().as_millis() as u64;

        let body = body.ok_or_else(|| {
            ScanError::OracleResponseInvalid("no response from analysis service".to_string())
        })?;
        let report = parse_report(&body)?;

        Ok(OracleOutput {
            report,
            scan_duration_ms,
        })
    }
}
