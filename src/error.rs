//! 统一错误模型
//! 定义认证错误分类、应用错误类型和错误响应格式

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 认证流水线错误
///
/// 前三种是凭证错误，由认证网关统一转换为 401；
/// `StoreUnavailable` 是依赖故障，必须以 5xx 呈现。
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("api key not found")]
    ApiKeyNotFound,

    #[error("token invalid")]
    TokenInvalid,

    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// 网关对外的统一拒绝，不携带失败原因
    #[error("unauthenticated")]
    Unauthenticated,
}

impl AuthError {
    /// 是否为凭证类错误（而非依赖故障）
    pub fn is_credential_failure(&self) -> bool {
        !matches!(self, AuthError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::StoreUnavailable(e.to_string())
    }
}

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Upstream error: {0}")]
    BadGateway(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized => "unauthorized".to_string(),
            AppError::NotFound => "not found".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::StoreUnavailable(_) => "authentication temporarily unavailable".to_string(),
            AppError::BadGateway(_) => "bad gateway".to_string(),
            AppError::Timeout(_) => "request timed out".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::StoreUnavailable(msg) => AppError::StoreUnavailable(msg),
            AuthError::InvalidCredentials
            | AuthError::ApiKeyNotFound
            | AuthError::TokenInvalid
            | AuthError::Unauthenticated => AppError::Unauthorized,
        }
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
            },
        };

        // 服务端故障记录 error，客户端错误仅 debug
        if status.is_server_error() {
            tracing::error!(code = self.code(), message = %self, "Application error");
        } else {
            tracing::debug!(code = self.code(), message = %self, "Request rejected");
        }

        let mut response = (status, Json(error_response)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
