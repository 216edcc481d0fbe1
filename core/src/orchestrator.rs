//! 扫描编排
//!
//! 按 抓取 → 组装 → 分析 → 规范化 的顺序执行一次扫描。扫描状态是一个显式的状态机，
//! 只能通过 [`ScanEvent`] 迁移；同一时间只允许一个扫描，新的扫描请求在已有扫描进行中时被拒绝。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::assembler::Assembler;
use crate::config::SentinelConfig;
use crate::error::{Result, ScanError};
use crate::fetcher::{parse_reference, GitHubFetcher, RepositorySource};
use crate::model::{
    AnalysisReport, AnalysisRequest, Provenance, RepositoryReference, RepositorySummary,
};
use crate::normalizer::normalize;
use crate::oracle::{AnalysisClient, GeminiBackend};

/// 展示层提交的扫描请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInput {
    #[serde(default)]
    pub pasted_code: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub language_hint: Option<String>,
}

impl ScanInput {
    pub fn pasted(code: impl Into<String>, language_hint: Option<&str>) -> Self {
        Self {
            pasted_code: Some(code.into()),
            repository_url: None,
            language_hint: language_hint.map(str::to_string),
        }
    }

    pub fn repository(url: impl Into<String>) -> Self {
        Self {
            pasted_code: None,
            repository_url: Some(url.into()),
            language_hint: None,
        }
    }
}

/// 成功扫描的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositorySummary>,
    pub report: AnalysisReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanPhase {
    Idle,
    Fetching,
    Assembling,
    Analyzing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
enum ScanTarget {
    Repository(RepositoryReference),
    Pasted(String),
}

#[derive(Debug, Clone)]
enum ScanEvent {
    Started { scan_id: Uuid, target: ScanTarget },
    Fetched { summary: RepositorySummary },
    Assembled { corpus: String },
    Completed { report: AnalysisReport },
    Failed { error: String, kind: &'static str },
    /// 输入在扫描开始前就被判定无效
    Rejected {
        scan_id: Uuid,
        error: String,
        kind: &'static str,
    },
}

#[derive(Debug, Clone)]
enum ScanState {
    Idle,
    Fetching {
        scan_id: Uuid,
    },
    Assembling {
        scan_id: Uuid,
        repository: RepositorySummary,
    },
    Analyzing {
        scan_id: Uuid,
        repository: Option<RepositorySummary>,
        corpus: String,
    },
    Succeeded {
        outcome: ScanOutcome,
    },
    Failed {
        scan_id: Uuid,
        error: String,
        kind: &'static str,
        repository: Option<RepositorySummary>,
        corpus: Option<String>,
    },
}

impl ScanState {
    fn phase(&self) -> ScanPhase {
        match self {
            ScanState::Idle => ScanPhase::Idle,
            ScanState::Fetching { .. } => ScanPhase::Fetching,
            ScanState::Assembling { .. } => ScanPhase::Assembling,
            ScanState::Analyzing { .. } => ScanPhase::Analyzing,
            ScanState::Succeeded { .. } => ScanPhase::Succeeded,
            ScanState::Failed { .. } => ScanPhase::Failed,
        }
    }

    fn scan_id(&self) -> Option<Uuid> {
        match self {
            ScanState::Idle => None,
            ScanState::Fetching { scan_id, .. }
            | ScanState::Assembling { scan_id, .. }
            | ScanState::Analyzing { scan_id, .. }
            | ScanState::Failed { scan_id, .. } => Some(*scan_id),
            ScanState::Succeeded { outcome } => Some(outcome.scan_id),
        }
    }

    fn is_active(&self) -> bool {
        matches!(
            self,
            ScanState::Fetching { .. } | ScanState::Assembling { .. } | ScanState::Analyzing { .. }
        )
    }

    fn apply(&self, event: ScanEvent) -> Result<ScanState> {
        match (self, event) {
            (state, ScanEvent::Started { .. }) if state.is_active() => Err(ScanError::ScanInProgress),
            (_, ScanEvent::Started { scan_id, target }) => Ok(match target {
                ScanTarget::Repository(_) => ScanState::Fetching { scan_id },
                // 粘贴的代码跳过抓取和组装
                ScanTarget::Pasted(corpus) => ScanState::Analyzing {
                    scan_id,
                    repository: None,
                    corpus,
                },
            }),
            (state, ScanEvent::Rejected { .. }) if state.is_active() => Err(ScanError::ScanInProgress),
            (
                _,
                ScanEvent::Rejected {
                    scan_id,
                    error,
                    kind,
                },
            ) => Ok(ScanState::Failed {
                scan_id,
                error,
                kind,
                repository: None,
                corpus: None,
            }),
            (ScanState::Fetching { scan_id, .. }, ScanEvent::Fetched { summary }) => {
                Ok(ScanState::Assembling {
                    scan_id: *scan_id,
                    repository: summary,
                })
            }
            (
                ScanState::Assembling {
                    scan_id,
                    repository,
                },
                ScanEvent::Assembled { corpus },
            ) => Ok(ScanState::Analyzing {
                scan_id: *scan_id,
                repository: Some(repository.clone()),
                corpus,
            }),
            (
                ScanState::Analyzing {
                    scan_id,
                    repository,
                    ..
                },
                ScanEvent::Completed { report },
            ) => Ok(ScanState::Succeeded {
                outcome: ScanOutcome {
                    scan_id: *scan_id,
                    repository: repository.clone(),
                    report,
                },
            }),
            (ScanState::Fetching { scan_id, .. }, ScanEvent::Failed { error, kind }) => {
                Ok(ScanState::Failed {
                    scan_id: *scan_id,
                    error,
                    kind,
                    repository: None,
                    corpus: None,
                })
            }
            (
                ScanState::Assembling {
                    scan_id,
                    repository,
                },
                ScanEvent::Failed { error, kind },
            ) => Ok(ScanState::Failed {
                scan_id: *scan_id,
                error,
                kind,
                repository: Some(repository.clone()),
                corpus: None,
            }),
            // 分析失败时保留已组装的语料（可能是演示语料）
            (
                ScanState::Analyzing {
                    scan_id,
                    repository,
                    corpus,
                },
                ScanEvent::Failed { error, kind },
            ) => Ok(ScanState::Failed {
                scan_id: *scan_id,
                error,
                kind,
                repository: repository.clone(),
                corpus: Some(corpus.clone()),
            }),
            (state, event) => Err(ScanError::Transition(format!(
                "{:?} cannot handle {}",
                state.phase(),
                event_name(&event)
            ))),
        }
    }
}

fn event_name(event: &ScanEvent) -> &'static str {
    match event {
        ScanEvent::Started { .. } => "Started",
        ScanEvent::Fetched { .. } => "Fetched",
        ScanEvent::Assembled { .. } => "Assembled",
        ScanEvent::Completed { .. } => "Completed",
        ScanEvent::Failed { .. } => "Failed",
        ScanEvent::Rejected { .. } => "Rejected",
    }
}

/// 当前扫描状态的快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub phase: ScanPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositorySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// 失败时可见的语料
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
}

impl From<&ScanState> for ScanStatus {
    fn from(state: &ScanState) -> Self {
        let mut status = ScanStatus {
            phase: state.phase(),
            scan_id: state.scan_id(),
            repository: None,
            error: None,
            error_kind: None,
            corpus: None,
            report: None,
        };
        match state {
            ScanState::Idle | ScanState::Fetching { .. } => {}
            ScanState::Assembling { repository, .. } => {
                status.repository = Some(repository.clone());
            }
            ScanState::Analyzing { repository, .. } => {
                status.repository = repository.clone();
            }
            ScanState::Succeeded { outcome } => {
                status.repository = outcome.repository.clone();
                status.report = Some(outcome.report.clone());
            }
            ScanState::Failed {
                error,
                kind,
                repository,
                corpus,
                ..
            } => {
                status.error = Some(error.clone());
                status.error_kind = Some(*kind);
                status.repository = repository.clone();
                status.corpus = corpus.clone();
            }
        }
        status
    }
}

/// 仓库主语言到分析提示的映射
pub fn language_hint_for(primary_language: &str) -> Option<&'static str> {
    let hint = match primary_language {
        "Python" => "python",
        "JavaScript" => "javascript",
        "TypeScript" => "typescript",
        "Java" => "java",
        "Go" => "go",
        "PHP" => "php",
        "C++" => "cpp",
        "C#" => "csharp",
        "Ruby" => "ruby",
        "Shell" => "bash",
        "PowerShell" => "powershell",
        "HTML" => "html",
        "CSS" => "css",
        _ => return None,
    };
    Some(hint)
}

pub struct Orchestrator {
    source: Arc<dyn RepositorySource>,
    analyzer: AnalysisClient,
    assembler: Assembler,
    state: Mutex<ScanState>,
}

/// 扫描 future 被提前丢弃（例如客户端断开）时，把状态置为失败，避免一直占用扫描槽位
struct ActiveScan<'a> {
    orchestrator: &'a Orchestrator,
    scan_id: Uuid,
}

impl Drop for ActiveScan<'_> {
    fn drop(&mut self) {
        let mut state = self.orchestrator.lock_state();
        if state.is_active() && state.scan_id() == Some(self.scan_id) {
            tracing::warn!("Scan {} was cancelled before completion", self.scan_id);
            let event = ScanEvent::Failed {
                error: "scan was cancelled".to_string(),
                kind: "cancelled",
            };
            if let Ok(next) = state.apply(event) {
                *state = next;
            }
        }
    }
}

impl Orchestrator {
    pub fn new(source: Arc<dyn RepositorySource>, analyzer: AnalysisClient, assembler: Assembler) -> Self {
        Self {
            source,
            analyzer,
            assembler,
            state: Mutex::new(ScanState::Idle),
        }
    }

    pub fn from_config(config: &SentinelConfig) -> Result<Self> {
        let source = GitHubFetcher::new(&config.repository)?;
        let analyzer = AnalysisClient::new(Arc::new(GeminiBackend::new(&config.oracle)?));
        tracing::info!(
            "Scan pipeline ready: up to {} files per repository, oracle {}",
            source.policy().max_files,
            analyzer.backend_name()
        );
        Ok(Self::new(
            Arc::new(source),
            analyzer,
            Assembler::new(config.corpus.max_chars),
        ))
    }

    fn lock_state(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ScanStatus {
        ScanStatus::from(&*self.lock_state())
    }

    /// 只接受属于当前扫描的事件，过期扫描的迟到结果被丢弃
    fn transition(&self, scan_id: Uuid, event: ScanEvent) -> Result<()> {
        let mut state = self.lock_state();
        if state.scan_id() != Some(scan_id) {
            tracing::warn!(
                "Discarding {} for superseded scan {}",
                event_name(&event),
                scan_id
            );
            return Err(ScanError::Transition(format!("scan {} is no longer current", scan_id)));
        }
        let next = state.apply(event)?;
        tracing::debug!("Scan {}: {:?} -> {:?}", scan_id, state.phase(), next.phase());
        *state = next;
        Ok(())
    }

    fn begin(&self, scan_id: Uuid, target: ScanTarget) -> Result<ActiveScan<'_>> {
        let mut state = self.lock_state();
        let next = state.apply(ScanEvent::Started { scan_id, target })?;
        *state = next;
        Ok(ActiveScan {
            orchestrator: self,
            scan_id,
        })
    }

    /// 仓库 URL 非空时解析仓库引用，否则要求粘贴的代码非空
    fn resolve_target(&self, input: &ScanInput) -> Result<ScanTarget> {
        match input
            .repository_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        {
            Some(url) => Ok(ScanTarget::Repository(parse_reference(
                url,
                self.source.host_marker(),
            )?)),
            None => {
                let code = input.pasted_code.clone().unwrap_or_default();
                if code.trim().is_empty() {
                    return Err(ScanError::EmptyInput);
                }
                Ok(ScanTarget::Pasted(code))
            }
        }
    }

    /// 无效输入不会开始扫描；没有扫描在进行时才把错误记录为最终状态
    fn reject(&self, scan_id: Uuid, error: ScanError) -> ScanError {
        tracing::warn!("Scan {} rejected: {}", scan_id, error);
        let event = ScanEvent::Rejected {
            scan_id,
            error: error.to_string(),
            kind: error.kind(),
        };
        let mut state = self.lock_state();
        match state.apply(event) {
            Ok(next) => *state = next,
            Err(_) => tracing::debug!("Another scan is running, rejection not recorded"),
        }
        error
    }

    /// 执行一次完整扫描。
    ///
    /// 仓库 URL 非空时扫描仓库，否则分析粘贴的代码。任何失败都会记录为当前扫描的最终错误，
    /// 并清除上一次的报告。
    pub async fn scan(&self, input: ScanInput) -> Result<ScanOutcome> {
        let scan_id = Uuid::new_v4();
        let target = match self.resolve_target(&input) {
            Ok(target) => target,
            Err(e) => return Err(self.reject(scan_id, e)),
        };

        let _active = self.begin(scan_id, target.clone())?;
        tracing::info!("Scan {} started", scan_id);

        let result = match target {
            ScanTarget::Repository(reference) => {
                self.run_repository(scan_id, &reference, input.language_hint)
                    .await
            }
            ScanTarget::Pasted(code) => self.run_pasted(scan_id, code, input.language_hint).await,
        };

        match result {
            Ok(outcome) => {
                tracing::info!(
                    "Scan {} finished: score {}, {} findings",
                    scan_id,
                    outcome.report.overall_score,
                    outcome.report.vulnerabilities.len()
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Scan {} failed: {}", scan_id, e);
                let event = ScanEvent::Failed {
                    error: e.to_string(),
                    kind: e.kind(),
                };
                if let Err(transition_error) = self.transition(scan_id, event) {
                    tracing::warn!("Could not record failure: {}", transition_error);
                }
                Err(e)
            }
        }
    }

    async fn run_pasted(
        &self,
        scan_id: Uuid,
        code: String,
        language_hint: Option<String>,
    ) -> Result<ScanOutcome> {
        let request = AnalysisRequest::new(code, language_hint, Provenance::Pasted);
        self.analyze(scan_id, request).await
    }

    async fn run_repository(
        &self,
        scan_id: Uuid,
        reference: &RepositoryReference,
        language_hint: Option<String>,
    ) -> Result<ScanOutcome> {
        let fetched = self.source.fetch(reference).await?;
        self.transition(
            scan_id,
            ScanEvent::Fetched {
                summary: fetched.summary.clone(),
            },
        )?;

        // 仓库主语言优先，其次使用调用方的提示
        let hint = fetched
            .summary
            .primary_language
            .as_deref()
            .and_then(language_hint_for)
            .map(str::to_string)
            .or(language_hint);

        let request = self.assembler.assemble(
            &fetched.summary,
            &fetched.units,
            fetched.provenance,
            hint,
            Utc::now(),
        );
        self.transition(
            scan_id,
            ScanEvent::Assembled {
                corpus: request.corpus().to_string(),
            },
        )?;

        self.analyze(scan_id, request).await
    }

    async fn analyze(&self, scan_id: Uuid, request: AnalysisRequest) -> Result<ScanOutcome> {
        let output = self.analyzer.analyze(&request).await?;
        let report = normalize(output, request.provenance());

        self.transition(
            scan_id,
            ScanEvent::Completed {
                report: report.clone(),
            },
        )?;

        match &*self.lock_state() {
            ScanState::Succeeded { outcome } if outcome.scan_id == scan_id => Ok(outcome.clone()),
            _ => Err(ScanError::Transition(format!("scan {} is no longer current", scan_id))),
        }
    }
}
