//! 路径前缀转发服务
//!
//! 按最长前缀选择上游，去掉前缀后原样转发。认证结果通过
//! `X-Gateway-*` 请求头传给上游，客户端自带的同名头会被清除。

use crate::{
    auth::identity::identity_of,
    config::{ProxyConfig, RouteEntry},
    error::AppError,
};
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue, Uri},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;

pub const USER_ID_HEADER: &str = "x-gateway-user-id";
pub const USER_EMAIL_HEADER: &str = "x-gateway-user-email";
pub const AUTH_METHOD_HEADER: &str = "x-gateway-auth-method";

const GATEWAY_HEADER_PREFIX: &str = "x-gateway-";

// 逐跳头，不转发
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

pub struct ProxyService {
    // 按前缀长度降序排列
    routes: Vec<RouteEntry>,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl ProxyService {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, AppError> {
        let routes = config.parse_routes()?;
        Ok(Self::new(routes, Duration::from_secs(config.upstream_timeout_secs)))
    }

    pub fn new(mut routes: Vec<RouteEntry>, timeout: Duration) -> Self {
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        let client = Client::<(), ()>::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            routes,
            client,
            timeout,
        }
    }

    /// 查找匹配的路由，返回去掉前缀后的路径
    pub fn resolve<'a>(&self, path: &'a str) -> Option<(&RouteEntry, &'a str)> {
        self.routes.iter().find_map(|route| {
            let rest = path.strip_prefix(route.prefix.as_str())?;
            if rest.is_empty() {
                Some((route, "/"))
            } else if rest.starts_with('/') {
                Some((route, rest))
            } else {
                None
            }
        })
    }

    /// 转发请求到上游
    pub async fn forward(&self, req: Request) -> Result<Response, AppError> {
        let (route, rest) = self.resolve(req.uri().path()).ok_or(AppError::NotFound)?;
        let target = target_uri(&route.upstream, rest, req.uri().query())?;
        let prefix = route.prefix.clone();

        let (mut parts, body) = req.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);
        set_identity_headers(&mut parts.headers, &parts.extensions);
        parts.uri = target;

        tracing::debug!(route = %prefix, upstream = %parts.uri, "Forwarding request");

        let upstream_req = Request::from_parts(parts, body);
        let response = match tokio::time::timeout(self.timeout, self.client.request(upstream_req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                record_forward(&prefix, "error");
                tracing::warn!(route = %prefix, error = %e, "Upstream request failed");
                return Err(AppError::BadGateway(e.to_string()));
            }
            Err(_) => {
                record_forward(&prefix, "timeout");
                return Err(AppError::Timeout(format!("upstream for {prefix}")));
            }
        };

        record_forward(&prefix, "success");

        let mut response = response.map(Body::new);
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }
}

fn target_uri(upstream: &Uri, rest: &str, query: Option<&str>) -> Result<Uri, AppError> {
    let authority = upstream
        .authority()
        .ok_or_else(|| AppError::Internal("upstream without authority".to_string()))?;
    let base = upstream.path().trim_end_matches('/');

    let uri = match query {
        Some(q) => format!("http://{authority}{base}{rest}?{q}"),
        None => format!("http://{authority}{base}{rest}"),
    };

    uri.parse()
        .map_err(|e| AppError::Internal(format!("Failed to build upstream URI: {}", e)))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Connection 头中列出的字段同样是逐跳的
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn set_identity_headers(headers: &mut HeaderMap, extensions: &axum::http::Extensions) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(GATEWAY_HEADER_PREFIX))
        .cloned()
        .collect();
    for name in spoofed {
        headers.remove(name);
    }

    let Some(identity) = identity_of(extensions) else {
        return;
    };

    let values = [
        (USER_ID_HEADER, identity.user_id.to_string()),
        (USER_EMAIL_HEADER, identity.email.clone()),
        (AUTH_METHOD_HEADER, identity.method.as_str().to_string()),
    ];
    for (name, value) in values {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = name, "Identity value is not a valid header value"),
        }
    }
}

fn record_forward(route: &str, outcome: &'static str) {
    metrics::counter!("proxy_requests_total", "route" => route.to_string(), "outcome" => outcome)
        .increment(1);
}
