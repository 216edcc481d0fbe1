use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Deserialize;

use super::fallback::fallback_units;
use super::{truncate_chars, ContentEntry, FetchPolicy, FetchedRepository, RepositorySource};
use crate::config::RepositoryHostConfig;
use crate::error::{Result, ScanError};
use crate::http::{build_http_client, send_with_retry, RetryPolicy};
use crate::model::{ContentUnit, Provenance, RepositoryReference, RepositorySummary};

#[derive(Debug, Deserialize)]
struct RepoMetadata {
    full_name: String,
    description: Option<String>,
    stargazers_count: u64,
    forks_count: u64,
    language: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<RepoMetadata> for RepositorySummary {
    fn from(meta: RepoMetadata) -> Self {
        RepositorySummary {
            full_name: meta.full_name,
            description: meta.description.filter(|d| !d.trim().is_empty()),
            star_count: meta.stargazers_count,
            fork_count: meta.forks_count,
            primary_language: meta.language,
            updated_at: meta.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadmeResponse {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// GitHub REST API 抓取器
pub struct GitHubFetcher {
    client: reqwest::Client,
    api_base: String,
    host_marker: String,
    token: Option<String>,
    retry: RetryPolicy,
    policy: FetchPolicy,
}

impl GitHubFetcher {
    pub fn new(config: &RepositoryHostConfig) -> Result<Self> {
        let client = build_http_client(config.timeout())?;
        let policy = FetchPolicy::from_config(config)?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            host_marker: config.host_marker.clone(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            retry: config.retry.clone(),
            policy,
        })
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    fn repo_url(&self, reference: &RepositoryReference, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_base, reference.owner, reference.name, suffix
        )
    }

    // 所有对托管平台的请求都带上可选的 bearer 凭据
    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_summary(&self, reference: &RepositoryReference) -> Result<RepositorySummary> {
        let url = self.repo_url(reference, "");
        tracing::debug!("Fetching repository metadata: {}", url);

        let response = send_with_retry(&self.retry, || self.get(&url)).await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("Repository {} unavailable: HTTP {}", reference, status);
            return Err(ScanError::RepositoryUnavailable {
                status: status.as_u16(),
            });
        }

        let metadata: RepoMetadata = response.json().await?;
        Ok(metadata.into())
    }

    /// README 只是尽力获取，任何失败都返回 None
    async fn fetch_readme(&self, reference: &RepositoryReference) -> Option<ContentUnit> {
        let url = self.repo_url(reference, "/readme");

        let response = match send_with_retry(&self.retry, || self.get(&url)).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::info!("No README found for {} (HTTP {})", reference, response.status());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch README for {}: {}", reference, e);
                return None;
            }
        };

        let readme: ReadmeResponse = match response.json().await {
            Ok(readme) => readme,
            Err(e) => {
                tracing::warn!("Failed to parse README response for {}: {}", reference, e);
                return None;
            }
        };

        let text = decode_base64_content(readme.content.as_deref()?)?;
        let path = readme.path.unwrap_or_else(|| "README".to_string());
        Some(ContentUnit::readme(
            path,
            truncate_chars(&text, self.policy.max_readme_chars),
        ))
    }

    async fn fetch_listing(&self, reference: &RepositoryReference) -> Result<Vec<ContentEntry>> {
        let url = self.repo_url(reference, "/contents");

        let response = send_with_retry(&self.retry, || self.get(&url))
            .await
            .map_err(|e| ScanError::ContentUnavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::ContentUnavailable(format!("HTTP {}", status)));
        }

        response
            .json::<Vec<ContentEntry>>()
            .await
            .map_err(|e| ScanError::ContentUnavailable(e.to_string()))
    }

    async fn download(&self, url: &str) -> reqwest::Result<String> {
        let response = send_with_retry(&self.retry, || self.get(url))
            .await?
            .error_for_status()?;
        response.text().await
    }

    /// 单个文件失败只记录日志，不影响其他文件
    async fn fetch_file(&self, entry: &ContentEntry) -> Option<ContentUnit> {
        let Some(url) = entry.download_url.as_deref() else {
            tracing::warn!("Skipping {}: no download URL", entry.path);
            return None;
        };

        match self.download(url).await {
            Ok(text) => Some(ContentUnit::file(
                entry.path.clone(),
                truncate_chars(&text, self.policy.max_file_chars),
            )),
            Err(e) => {
                tracing::warn!("Could not fetch {}: {}", entry.path, e);
                None
            }
        }
    }
}

#[async_trait]
impl RepositorySource for GitHubFetcher {
    fn host_marker(&self) -> &str {
        &self.host_marker
    }

    async fn fetch(&self, reference: &RepositoryReference) -> Result<FetchedRepository> {
        tracing::info!("Fetching repository {}", reference);

        let summary = self.fetch_summary(reference).await?;
        let readme = self.fetch_readme(reference).await;
        let listing = self.fetch_listing(reference).await?;

        let selected = self.policy.select(&listing);
        tracing::debug!(
            "Selected {} of {} listing entries for {}",
            selected.len(),
            listing.len(),
            reference
        );

        // join_all 按输入顺序返回结果，与完成顺序无关
        let files: Vec<ContentUnit> = join_all(selected.into_iter().map(|entry| self.fetch_file(entry)))
            .await
            .into_iter()
            .flatten()
            .collect();

        let mut units: Vec<ContentUnit> = readme.into_iter().collect();
        let provenance = if files.is_empty() {
            tracing::warn!(
                "No analyzable files in {}, using built-in sample code",
                reference
            );
            units.extend(fallback_units());
            Provenance::Fallback
        } else {
            units.extend(files);
            Provenance::Repository
        };

        Ok(FetchedRepository {
            summary,
            units,
            provenance,
        })
    }
}

fn decode_base64_content(content: &str) -> Option<String> {
    // GitHub 返回的 base64 内容每 60 个字符换行
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!("README content is not valid base64: {}", e);
            None
        }
    }
}
