// Sentinel Core Library
// 仓库抓取、语料组装、LLM 分析和报告规范化的核心流水线

pub mod assembler;
pub mod config;
pub mod fetcher;
pub mod http;
pub mod model;
pub mod normalizer;
pub mod oracle;
pub mod orchestrator;

// 重新导出常用类型
pub use assembler::Assembler;
pub use config::{load_config, SentinelConfig};
pub use fetcher::{parse_reference, FetchedRepository, GitHubFetcher, RepositorySource};
pub use model::{
    AnalysisReport, AnalysisRequest, ContentOrigin, ContentUnit, Provenance, RepositoryReference,
    RepositorySummary, RiskLevel, Severity, Vulnerability,
};
pub use oracle::{AnalysisClient, GeminiBackend, OracleBackend};
pub use orchestrator::{Orchestrator, ScanInput, ScanOutcome, ScanPhase, ScanStatus};

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ScanError {
        #[error("Invalid repository URL: {0}")]
        InvalidReference(String),

        #[error("Repository not found or inaccessible ({status})")]
        RepositoryUnavailable { status: u16 },

        #[error("Could not access repository contents: {0}")]
        ContentUnavailable(String),

        #[error("Code cannot be empty")]
        EmptyInput,

        #[error("No usable response from analysis service: {0}")]
        OracleResponseInvalid(String),

        #[error("Analysis response does not match schema: {0}")]
        OracleResponseMalformed(#[source] serde_json::Error),

        #[error("Analysis service returned HTTP {status}: {body}")]
        OracleUnavailable { status: u16, body: String },

        #[error("Analysis service API key is not configured")]
        MissingApiKey,

        #[error("A scan is already in progress")]
        ScanInProgress,

        #[error("Invalid scan state transition: {0}")]
        Transition(String),

        #[error("Invalid configuration: {0}")]
        Config(String),

        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
    }

    impl ScanError {
        /// 稳定的错误类型标识，供 API 层返回
        pub fn kind(&self) -> &'static str {
            match self {
                ScanError::InvalidReference(_) => "invalid_reference",
                ScanError::RepositoryUnavailable { .. } => "repository_unavailable",
                ScanError::ContentUnavailable(_) => "content_unavailable",
                ScanError::EmptyInput => "empty_input",
                ScanError::OracleResponseInvalid(_) => "oracle_response_invalid",
                ScanError::OracleResponseMalformed(_) => "oracle_response_malformed",
                ScanError::OracleUnavailable { .. } => "oracle_unavailable",
                ScanError::MissingApiKey => "missing_api_key",
                ScanError::ScanInProgress => "scan_in_progress",
                ScanError::Transition(_) => "invalid_transition",
                ScanError::Config(_) => "config",
                ScanError::Http(_) => "http",
            }
        }
    }

    pub type Result<T> = std::result::Result<T, ScanError>;
}
