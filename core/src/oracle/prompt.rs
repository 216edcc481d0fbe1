use serde_json::{json, Value};

/// 顶层必填字段
pub const REQUIRED_REPORT_FIELDS: &[&str] =
    &["overallScore", "riskLevel", "summary", "vulnerabilities", "language"];

/// 每条漏洞的必填字段
pub const REQUIRED_VULNERABILITY_FIELDS: &[&str] = &[
    "id",
    "title",
    "severity",
    "line",
    "description",
    "recommendation",
    "fixedCode",
];

pub fn build_prompt(corpus: &str, language_hint: Option<&str>) -> String {
    format!(
        r#"You are an expert Security Code Auditor and Penetration Tester.
Analyze the following source code for security vulnerabilities.
Focus on the OWASP Top 10, including but not limited to:
- Injection (SQL, NoSQL, Command, etc.)
- Broken Authentication
- Sensitive Data Exposure (Hardcoded secrets, PII)
- XML External Entities (XXE)
- Broken Access Control
- Security Misconfiguration
- Cross-Site Scripting (XSS)
- Insecure Deserialization

Provide a strict assessment. If the code is secure, explain why.

Language Hint: {}

Source Code:
```
{}
```
"#,
        language_hint.unwrap_or("Auto-detect"),
        corpus
    )
}

/// 结构化输出 schema（Gemini responseSchema 格式）
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "overallScore": {
                "type": "NUMBER",
                "description": "A security score from 0 to 100, where 100 is perfectly secure and 0 is critically vulnerable."
            },
            "riskLevel": {
                "type": "STRING",
                "enum": ["Safe", "Low", "Medium", "High", "Critical"],
                "description": "The overall risk level of the provided code."
            },
            "summary": {
                "type": "STRING",
                "description": "A concise executive summary of the security findings."
            },
            "language": {
                "type": "STRING",
                "description": "The programming language detected."
            },
            "vulnerabilities": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING", "description": "Unique identifier for the issue" },
                        "title": { "type": "STRING", "description": "Short title of the vulnerability (e.g., SQL Injection)" },
                        "severity": {
                            "type": "STRING",
                            "enum": ["Critical", "High", "Medium", "Low", "Info"],
                            "description": "Severity level of the vulnerability"
                        },
                        "line": { "type": "INTEGER", "description": "Line number where the issue starts" },
                        "description": { "type": "STRING", "description": "Detailed explanation of why this is a vulnerability" },
                        "codeSnippet": { "type": "STRING", "description": "The specific vulnerable code segment" },
                        "recommendation": { "type": "STRING", "description": "Actionable advice to fix the issue" },
                        "fixedCode": { "type": "STRING", "description": "Example of how the code should look after fixing" },
                        "cwe": { "type": "STRING", "description": "CWE ID if applicable (e.g., CWE-89)" }
                    },
                    "required": REQUIRED_VULNERABILITY_FIELDS
                }
            }
        },
        "required": REQUIRED_REPORT_FIELDS
    })
}
