//! 语料组装
//!
//! 把仓库元数据和抓取到的内容拼成一段文本交给分析服务。组装过程是纯函数，
//! 扫描时间由调用方传入，相同输入总是得到相同输出。

use chrono::{DateTime, SecondsFormat, Utc};

use crate::fetcher::truncate_chars;
use crate::model::{AnalysisRequest, ContentOrigin, ContentUnit, Provenance, RepositorySummary};

pub const FILE_MARKER: &str = "# ===== FILE:";
pub const SAMPLE_MARKER: &str = "# ===== SAMPLE:";
const BLOCK_END: &str = "==================================================";

#[derive(Debug, Clone, Default)]
pub struct Assembler {
    max_chars: Option<usize>,
}

impl Assembler {
    pub fn new(max_chars: Option<usize>) -> Self {
        Self { max_chars }
    }

    pub fn assemble(
        &self,
        summary: &RepositorySummary,
        units: &[ContentUnit],
        provenance: Provenance,
        language_hint: Option<String>,
        scanned_at: DateTime<Utc>,
    ) -> AnalysisRequest {
        let corpus = match self.max_chars {
            Some(max_chars) => bounded_corpus(summary, units, scanned_at, max_chars),
            None => render_corpus(summary, units, scanned_at),
        };
        AnalysisRequest::new(corpus, language_hint, provenance)
    }
}

pub fn render_corpus(
    summary: &RepositorySummary,
    units: &[ContentUnit],
    scanned_at: DateTime<Utc>,
) -> String {
    let mut corpus = String::new();

    corpus.push_str(&format!("# Repository: {}\n", summary.full_name));
    corpus.push_str(&format!(
        "# Description: {}\n",
        summary.description.as_deref().unwrap_or("No description")
    ));
    corpus.push_str(&format!(
        "# Primary Language: {}\n",
        summary.primary_language.as_deref().unwrap_or("Not specified")
    ));
    corpus.push_str(&format!(
        "# Stars: {} | Forks: {}\n",
        summary.star_count, summary.fork_count
    ));
    corpus.push_str(&format!(
        "# Scanned on: {}\n\n",
        scanned_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));

    for unit in units {
        match unit.origin {
            ContentOrigin::Readme => {
                corpus.push_str(&format!("# README\n{}\n\n", unit.text));
            }
            ContentOrigin::File => {
                corpus.push_str(&format!("\n{} {} =====\n", FILE_MARKER, unit.path));
                corpus.push_str(&unit.text);
                corpus.push_str(&format!("\n# {}\n", BLOCK_END));
            }
            ContentOrigin::Synthetic => {
                corpus.push_str(&format!("\n{} {} =====\n", SAMPLE_MARKER, unit.path));
                corpus.push_str(&unit.text);
                corpus.push_str(&format!("\n# {}\n", BLOCK_END));
            }
        }
    }

    let file_count = units
        .iter()
        .filter(|unit| unit.origin == ContentOrigin::File)
        .count();
    corpus.push_str(&format!("\n# Total files analyzed: {}", file_count));
    corpus
}

/// 超出上限时从末尾逐个丢弃文件块；只剩 README 仍超出时直接截断
fn bounded_corpus(
    summary: &RepositorySummary,
    units: &[ContentUnit],
    scanned_at: DateTime<Utc>,
    max_chars: usize,
) -> String {
    let mut kept: Vec<ContentUnit> = units.to_vec();

    loop {
        let corpus = render_corpus(summary, &kept, scanned_at);
        if corpus.chars().count() <= max_chars {
            return corpus;
        }

        match kept.iter().rposition(|unit| unit.origin != ContentOrigin::Readme) {
            Some(index) => {
                let dropped = kept.remove(index);
                tracing::warn!(
                    "Corpus exceeds {} chars, dropping {}",
                    max_chars,
                    dropped.path
                );
            }
            None => {
                tracing::warn!("Corpus header exceeds {} chars, truncating", max_chars);
                return truncate_chars(&corpus, max_chars);
            }
        }
    }
}
