use std::collections::HashSet;

use crate::model::{AnalysisReport, Provenance, Vulnerability};
use crate::oracle::{OracleOutput, OracleVulnerability};

/// 空字符串和 null 统一视为缺失
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_score(score: f64) -> u8 {
    let clamped = score.clamp(0.0, 100.0);
    if clamped != score {
        tracing::warn!("Oracle score {} outside 0..=100, clamped to {}", score, clamped);
    }
    clamped.round() as u8
}

fn normalize_vulnerability(raw: OracleVulnerability) -> Vulnerability {
    Vulnerability {
        id: raw.id,
        title: raw.title,
        severity: raw.severity,
        line: raw.line.clamp(0, u32::MAX as i64) as u32,
        description: raw.description,
        code_snippet: non_blank(raw.code_snippet),
        recommendation: raw.recommendation,
        fixed_code: raw.fixed_code,
        cwe: non_blank(raw.cwe),
    }
}

/// 把服务输出整理成展示层使用的报告。
///
/// 漏洞保持服务返回的顺序，不排序、不按 id 去重；重复 id 只记录警告。
pub fn normalize(output: OracleOutput, provenance: Provenance) -> AnalysisReport {
    let OracleOutput {
        report,
        scan_duration_ms,
    } = output;

    let vulnerabilities: Vec<Vulnerability> = report
        .vulnerabilities
        .into_iter()
        .map(normalize_vulnerability)
        .collect();

    let mut seen = HashSet::new();
    for vuln in &vulnerabilities {
        if !seen.insert(vuln.id.as_str()) {
            tracing::warn!("Duplicate vulnerability id in report: {}", vuln.id);
        }
    }

    AnalysisReport {
        overall_score: normalize_score(report.overall_score),
        risk_level: report.risk_level,
        summary: report.summary,
        vulnerabilities,
        language: report.language,
        scan_duration_ms,
        provenance,
    }
}
