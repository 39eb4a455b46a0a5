//! HTTP 中间件
//! 应用状态、请求追踪、请求时限

use crate::{
    auth::{gate::AuthGate, jwt::TokenService},
    config::AppConfig,
    error::AppError,
    repository::CredentialStore,
    services::{AuthService, ProxyService},
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// 应用状态
///
/// 所有成员在启动后不可变，请求之间只共享连接池。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn CredentialStore>,
    pub auth_gate: Arc<AuthGate>,
    pub auth_service: Arc<AuthService>,
    pub proxy_service: Arc<ProxyService>,
}

impl AppState {
    /// 根据配置和凭证存储组装所有服务
    pub fn new(config: AppConfig, store: Arc<dyn CredentialStore>) -> Result<Self, AppError> {
        let tokens = Arc::new(TokenService::from_config(&config)?);
        let auth_gate = Arc::new(AuthGate::new(
            tokens.clone(),
            store.clone(),
            &config.security,
        )?);
        let auth_service = Arc::new(AuthService::new(store.clone(), tokens));
        let proxy_service = Arc::new(ProxyService::from_config(&config.proxy)?);

        Ok(Self {
            config,
            store,
            auth_gate,
            auth_service,
            proxy_service,
        })
    }
}

/// 请求追踪中间件
/// 沿用或生成 request_id（同时写入转发请求和响应），并记录指标
pub async fn request_tracking_middleware(mut req: Request, next: Next) -> Response {
    let request_id = extract_or_generate_request_id(req.headers());
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    // user_id / auth_method 由认证网关填充
    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        user_id = tracing::field::Empty,
        auth_method = tracing::field::Empty,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        metrics::counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 请求时限中间件
/// 超时后丢弃内部 future，未完成的数据库查询随之取消，连接归还连接池
pub async fn request_deadline_middleware(
    State(deadline): State<Duration>,
    req: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis(), "Request deadline exceeded");
            AppError::Timeout("request deadline exceeded".to_string()).into_response()
        }
    }
}

/// 从请求头中提取或生成 request_id
fn extract_or_generate_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
