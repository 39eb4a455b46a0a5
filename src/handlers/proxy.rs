//! 转发处理器：未匹配到本地路由的请求按路径前缀转发

use crate::{error::AppError, middleware::AppState};
use axum::{
    extract::{Request, State},
    response::Response,
};
use std::sync::Arc;

pub async fn forward(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Response, AppError> {
    state.proxy_service.forward(req).await
}
