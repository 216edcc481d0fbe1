use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 仓库引用 owner/name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// 仓库元数据快照，每次扫描只获取一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub star_count: u64,
    pub fork_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_language: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentOrigin {
    Readme,
    File,
    /// 内置的演示代码，不是从仓库获取的
    Synthetic,
}

/// 语料中的一个文本块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub path: String,
    pub text: String,
    pub origin: ContentOrigin,
}

impl ContentUnit {
    pub fn readme(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            origin: ContentOrigin::Readme,
        }
    }

    pub fn file(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            origin: ContentOrigin::File,
        }
    }

    pub fn synthetic(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            origin: ContentOrigin::Synthetic,
        }
    }
}

/// 语料来源，会一直传递到最终报告
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// 从仓库真实获取的文件
    Repository,
    /// 仓库没有可用文件，使用了内置演示代码
    Fallback,
    /// 用户粘贴的代码
    Pasted,
}

/// 单次分析请求，构造后不可修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    corpus: String,
    language_hint: Option<String>,
    provenance: Provenance,
}

impl AnalysisRequest {
    pub fn new(corpus: String, language_hint: Option<String>, provenance: Provenance) -> Self {
        let language_hint = language_hint
            .map(|hint| hint.trim().to_string())
            .filter(|hint| !hint.is_empty());
        Self {
            corpus,
            language_hint,
            provenance,
        }
    }

    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    pub fn language_hint(&self) -> Option<&str> {
        self.language_hint.as_deref()
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn is_severe(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

/// 漏洞发现结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    /// 0 表示无法定位到具体行
    pub line: u32,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    pub recommendation: String,
    pub fixed_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
}

/// 交给展示层的最终报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub overall_score: u8,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub vulnerabilities: Vec<Vulnerability>,
    pub language: String,
    pub scan_duration_ms: u64,
    pub provenance: Provenance,
}

impl AnalysisReport {
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.vulnerabilities
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_language_hint_is_dropped() {
        let request = AnalysisRequest::new("code".into(), Some("  ".into()), Provenance::Pasted);
        assert_eq!(request.language_hint(), None);

        let request = AnalysisRequest::new("code".into(), Some(" python ".into()), Provenance::Pasted);
        assert_eq!(request.language_hint(), Some("python"));
    }

    #[test]
    fn vulnerability_omits_absent_optionals() {
        let vuln = Vulnerability {
            id: "V1".into(),
            title: "SQL Injection".into(),
            severity: Severity::Critical,
            line: 7,
            description: "query built by concatenation".into(),
            code_snippet: None,
            recommendation: "use parameterized queries".into(),
            fixed_code: "cursor.execute(q, (u,))".into(),
            cwe: None,
        };
        let json = serde_json::to_value(&vuln).unwrap();
        assert!(json.get("codeSnippet").is_none());
        assert!(json.get("cwe").is_none());
        assert_eq!(json["fixedCode"], "cursor.execute(q, (u,))");
        assert_eq!(json["severity"], "Critical");
    }
}
