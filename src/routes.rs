//! 路由注册
//! 创建所有路由并应用中间件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{auth::gate::auth_middleware, handlers, middleware::AppState};

/// 登录请求体上限
const LOGIN_BODY_LIMIT: usize = 16 * 1024;

/// 创建应用路由
///
/// 中间件顺序（由外到内）：请求追踪 -> 请求时限 -> 认证网关 -> 路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let deadline = Duration::from_secs(state.config.server.request_timeout_secs);

    // 探针（在免认证列表中）
    let probe_routes = Router::new()
        .route("/healthz", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readiness_check));

    let auth_routes = Router::new()
        .route(
            "/auth/login",
            post(handlers::auth::login).layer(RequestBodyLimitLayer::new(LOGIN_BODY_LIMIT)),
        )
        .route("/auth/me", get(handlers::auth::get_current_identity));

    Router::new()
        .merge(probe_routes)
        .merge(auth_routes)
        // 其余路径按前缀转发到上游
        .fallback(handlers::proxy::forward)
        .layer(axum::middleware::from_fn_with_state(
            state.auth_gate.clone(),
            auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            deadline,
            crate::middleware::request_deadline_middleware,
        ))
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
