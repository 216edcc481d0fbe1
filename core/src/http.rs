//! 共享的 HTTP 客户端构建和重试逻辑

use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("sentinel-audit/", env!("CARGO_PKG_VERSION"));

/// 瞬时失败（超时、连接错误、429、5xx）的重试策略。
///
/// `max_retries` 为 0 时每个请求只发送一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt - 1)))
    }
}

pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// 发送请求，按策略对瞬时失败进行指数退避重试。
///
/// 返回最后一次收到的响应（状态码可能不是 2xx），由调用方决定如何处理。
pub async fn send_with_retry<F>(policy: &RetryPolicy, build: F) -> reqwest::Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempt = 1;

    loop {
        match build().send().await {
            Ok(response) if attempt < max_attempts && is_transient_status(response.status()) => {
                tracing::warn!(
                    "Transient status {} from {}, retrying (attempt {}/{})",
                    response.status(),
                    response.url(),
                    attempt,
                    max_attempts
                );
            }
            Ok(response) => return Ok(response),
            Err(e) if attempt < max_attempts && is_transient_error(&e) => {
                tracing::warn!("Transient request error: {}, retrying (attempt {}/{})", e, attempt, max_attempts);
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_sends_once() {
        assert_eq!(RetryPolicy::default().max_retries, 0);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 100,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn only_throttling_and_server_errors_are_transient() {
        assert!(is_transient_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(reqwest::StatusCode::NOT_FOUND));
        assert!(!is_transient_status(reqwest::StatusCode::OK));
    }

    #[test]
    fn client_builds_with_timeout() {
        assert!(build_http_client(Duration::from_secs(5)).is_ok());
    }

    async fn send(server: &mockito::ServerGuard, policy: &RetryPolicy) -> reqwest::Response {
        let client = build_http_client(Duration::from_secs(5)).unwrap();
        let url = format!("{}/resource", server.url());
        send_with_retry(policy, || client.get(&url)).await.unwrap()
    }

    #[tokio::test]
    async fn default_policy_sends_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/resource")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let response = send(&server, &RetryPolicy::default()).await;
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/resource")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;
        let policy = RetryPolicy {
            max_retries: 2,
            backoff_base_ms: 1,
        };

        let response = send(&server, &policy).await;
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/resource")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 1,
        };

        let response = send(&server, &policy).await;
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        mock.assert_async().await;
    }
}
