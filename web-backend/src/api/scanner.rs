use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use sentinel_core::error::ScanError;
use sentinel_core::fetcher::fallback::SAMPLE_VULNERABLE_CODE;
use sentinel_core::ScanInput;
use thiserror::Error;

use crate::state::AppState;

/// 扫描错误到 HTTP 响应的映射
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] ScanError);

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            ScanError::InvalidReference(_) | ScanError::EmptyInput => StatusCode::BAD_REQUEST,
            ScanError::ScanInProgress => StatusCode::CONFLICT,
            ScanError::RepositoryUnavailable { .. }
            | ScanError::ContentUnavailable(_)
            | ScanError::OracleResponseInvalid(_)
            | ScanError::OracleResponseMalformed(_)
            | ScanError::OracleUnavailable { .. }
            | ScanError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind()
        }))
    }
}

pub fn configure_scanner_routes(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/scan", web::post().to(run_scan))
        .route("/status", web::get().to(get_status))
        .route("/sample", web::get().to(get_sample));
}

/// 执行扫描：仓库 URL 优先，否则分析粘贴的代码
pub async fn run_scan(
    state: web::Data<AppState>,
    body: web::Json<ScanInput>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    tracing::debug!(
        "Scan request: repository={:?}, pasted={} chars",
        input.repository_url,
        input.pasted_code.as_deref().map_or(0, |code| code.chars().count())
    );

    let outcome = state.orchestrator.scan(input).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn get_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.orchestrator.status())
}

pub async fn get_sample() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "code": SAMPLE_VULNERABLE_CODE,
        "languageHint": "python"
    }))
}
