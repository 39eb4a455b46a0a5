//! 认证相关的 HTTP 处理器

use crate::{
    auth::identity::Identity, error::AppError, middleware::AppState, models::auth::LoginRequest,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// 登录：校验邮箱密码并签发令牌
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected login payload");
        AppError::BadRequest("invalid payload".to_string())
    })?;

    let response = state.auth_service.login(req).await?;

    Ok(Json(response))
}

/// 获取当前请求的认证身份
pub async fn get_current_identity(identity: Identity) -> Json<Identity> {
    Json(identity)
}
