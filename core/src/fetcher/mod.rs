// Fetcher module - 仓库内容抓取
// 解析仓库引用，获取元数据、README 和有限数量的源码文件

pub mod fallback;
pub mod github;
pub mod reference;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RepositoryHostConfig;
use crate::error::{Result, ScanError};
use crate::model::{ContentUnit, Provenance, RepositoryReference, RepositorySummary};

pub use github::GitHubFetcher;
pub use reference::parse_reference;

/// 一次抓取的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedRepository {
    pub summary: RepositorySummary,
    /// README（如果有）在前，其后按目录列表顺序排列的文件
    pub units: Vec<ContentUnit>,
    pub provenance: Provenance,
}

impl FetchedRepository {
    pub fn file_count(&self) -> usize {
        self.units
            .iter()
            .filter(|unit| unit.origin == crate::model::ContentOrigin::File)
            .count()
    }
}

/// 仓库内容来源 trait
#[async_trait]
pub trait RepositorySource: Send + Sync {
    fn host_marker(&self) -> &str;

    async fn fetch(&self, reference: &RepositoryReference) -> Result<FetchedRepository>;
}

/// 顶层目录列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ContentEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// 文件筛选和截断规则
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_files: usize,
    pub max_file_chars: usize,
    pub max_readme_chars: usize,
    allowed: Regex,
}

impl FetchPolicy {
    pub fn from_config(config: &RepositoryHostConfig) -> Result<Self> {
        if config.extensions.is_empty() {
            return Err(ScanError::Config("extension allow-list is empty".to_string()));
        }

        let alternatives = config
            .extensions
            .iter()
            .map(|ext| regex::escape(ext.trim_start_matches('.')))
            .collect::<Vec<_>>()
            .join("|");
        let allowed = Regex::new(&format!(r"(?i)\.({})$", alternatives))
            .map_err(|e| ScanError::Config(format!("extension allow-list: {}", e)))?;

        Ok(Self {
            max_files: config.max_files,
            max_file_chars: config.max_file_chars,
            max_readme_chars: config.max_readme_chars,
            allowed,
        })
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.is_match(name)
    }

    /// 按列表顺序选出前 `max_files` 个符合条件的普通文件
    pub fn select<'a>(&self, listing: &'a [ContentEntry]) -> Vec<&'a ContentEntry> {
        listing
            .iter()
            .filter(|entry| entry.is_file() && self.is_allowed(&entry.name))
            .take(self.max_files)
            .collect()
    }
}

/// 按字符（而不是字节）截断
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
