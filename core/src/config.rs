use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::http::RetryPolicy;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_ORACLE_API: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ORACLE_MODEL: &str = "gemini-3-pro-preview";

/// 默认允许分析的源码、配置和文档扩展名
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "go", "php", "cpp", "c", "cs", "rb", "sh", "bash",
    "zsh", "ps1", "yml", "yaml", "json", "xml", "html", "css", "sql", "md",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub server: ServerConfig,
    pub repository: RepositoryHostConfig,
    pub oracle: OracleConfig,
    pub corpus: CorpusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            static_dir: "./dist".to_string(),
        }
    }
}

/// 代码托管平台的访问配置和抓取上限
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryHostConfig {
    pub api_base: String,
    /// URL 中必须出现的主机标识
    pub host_marker: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    pub max_files: usize,
    pub max_file_chars: usize,
    pub max_readme_chars: usize,
    pub extensions: Vec<String>,
}

impl Default for RepositoryHostConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API.to_string(),
            host_marker: "github.com".to_string(),
            token: None,
            timeout_secs: 30,
            retry: RetryPolicy::default(),
            max_files: 5,
            max_file_chars: 8000,
            max_readme_chars: 1000,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

impl RepositoryHostConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub api_base: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub thinking_budget: u32,
    pub retry: RetryPolicy,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_ORACLE_API.to_string(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            api_key: None,
            timeout_secs: 180,
            thinking_budget: 4096,
            retry: RetryPolicy::default(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// 语料总长度上限（字符），None 表示不限制
    pub max_chars: Option<usize>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            max_chars: Some(200_000),
        }
    }
}

impl SentinelConfig {
    /// 用环境变量覆盖配置项
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(bind) = get("SENTINEL_BIND") {
            self.server.bind_address = bind;
        }
        if let Some(api) = get("SENTINEL_GITHUB_API") {
            self.repository.api_base = api;
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.repository.token = Some(token);
        }
        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("API_KEY")) {
            self.oracle.api_key = Some(key);
        }
        if let Some(url) = get("SENTINEL_ORACLE_URL") {
            self.oracle.api_base = url;
        }
        if let Some(model) = get("SENTINEL_ORACLE_MODEL") {
            self.oracle.model = model;
        }
    }
}

/// 加载配置：可选的 YAML 文件，再叠加环境变量
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<SentinelConfig> {
    let mut config = match path {
        Some(path) => {
            let path = path.as_ref();
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            serde_yaml::from_str::<SentinelConfig>(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        }
        None => SentinelConfig::default(),
    };

    config.apply_env();
    Ok(config)
}
